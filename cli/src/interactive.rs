use std::{
    fs::File,
    io::{stdout, BufRead, BufWriter, Write},
    path::Path,
};

use anyhow::{anyhow, Result};
use cache_sim::{
    common::parse_hex,
    config::{
        check_associativity, check_cache_size, check_ram_size, CacheConfig, Geometry, ReplacementPolicy,
        WriteHitPolicy, WriteMissPolicy,
    },
    io::{dump_cache, dump_memory},
    sim::Simulator,
};
use num_enum::TryFromPrimitive;

const DEFAULT_CACHE_DUMP: &str = "cache.txt";
const DEFAULT_MEMORY_DUMP: &str = "ram.txt";

peg::parser!(grammar command() for str {
    // validated by the simulator so that bad values surface as request errors
    rule value() -> &'input str
        = $(quiet!{[^ ' ' | '\t' | '\r' | '\n']+})
        / expected!("value")
    rule json() -> bool
        = __ "json" { true }
        / { false }
    rule dest() -> Option<&'input str>
        = __ p:value() { Some(p) }
        / { None }
    rule menu_command() -> Command<'input>
        = "cache-read" __ a:value() { Command::Read(a) }
        / "cache-write" __ a:value() __ b:value() { Command::Write(a, b) }
        / "cache-flush" { Command::Flush }
        / "cache-view" j:json() { Command::CacheView { json: j } }
        / "memory-view" j:json() { Command::MemoryView { json: j } }
        / "cache-dump" p:dest() { Command::CacheDump(p) }
        / "memory-dump" p:dest() { Command::MemoryDump(p) }
        / "help" { Command::Help }
        / ("quit" / "exit") { Command::Quit }
    pub(crate) rule parse_command() -> Command<'input>
        = _ c:menu_command() _ { c }
        / expected!("command")
    pub(crate) rule init_ram() -> (&'input str, &'input str)
        = _ ("init-ram" / "init") __ s:value() __ e:value() _ { (s, e) }

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
        / expected!("whitespace")
    rule _() = ws()*
    rule __() = ws()+
});

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Read(&'a str),
    Write(&'a str, &'a str),
    Flush,
    CacheView { json: bool },
    MemoryView { json: bool },
    CacheDump(Option<&'a str>),
    MemoryDump(Option<&'a str>),
    Help,
    Quit,
}

/// `None` at end of input.
fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut buf = String::new();
    if input.read_line(&mut buf)? == 0 {
        Ok(None)
    } else {
        Ok(Some(buf))
    }
}

fn prompt<T>(
    input: &mut impl BufRead,
    label: &str,
    mut accept: impl FnMut(&str) -> Option<T>,
) -> Result<T> {
    loop {
        print!("{label}: ");
        stdout().flush()?;
        let line = read_line(input)?
            .ok_or_else(|| anyhow!("input ended while waiting for {label}"))?;
        match accept(line.trim()) {
            Some(v) => return Ok(v),
            None => println!("ERROR: invalid {label}"),
        }
    }
}

fn policy<P: TryFromPrimitive<Primitive = u8>>(s: &str) -> Option<P> {
    s.parse::<u8>().ok().and_then(|code| P::try_from_primitive(code).ok())
}

/// Asks for the memory range in the form `init-ram 0x00 0xFF`; memory size is
/// `end - start + 1`.
pub fn prompt_ram_size(input: &mut impl BufRead) -> Result<usize> {
    println!("initialize the RAM:");
    loop {
        let line = read_line(input)?
            .ok_or_else(|| anyhow!("input ended before the RAM was initialized"))?;
        let (start, end) = match command::init_ram(&line) {
            Ok(r) => r,
            Err(e) => {
                println!("parse error: expected {}", e.expected);
                continue;
            }
        };
        let (start, end) = match (parse_hex(start), parse_hex(end)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                println!("ERROR: {e}");
                continue;
            }
        };
        let Some(size) = end.checked_sub(start).and_then(|d| d.checked_add(1)) else {
            println!("ERROR: RAM range {start:#x}..={end:#x} is empty or too large");
            continue;
        };
        match check_ram_size(size) {
            Ok(_) => {
                println!("RAM successfully initialized!");
                return Ok(size);
            }
            Err(e) => println!("ERROR: {e}"),
        }
    }
}

/// The configuration dialogue. Each field is re-prompted until valid, and the
/// whole cache section is asked again when the fields do not fit together.
pub fn configure(input: &mut impl BufRead) -> Result<CacheConfig> {
    let ram_size = prompt_ram_size(input)?;
    loop {
        println!("configure the cache:");
        let cache_size = prompt(input, "cache size", |s| {
            s.parse::<usize>()
                .ok()
                .filter(|&c| check_cache_size(c).is_ok())
        })?;
        let block_size = prompt(input, "data block size", |s| {
            s.parse::<usize>().ok().filter(|b| b.is_power_of_two())
        })?;
        let associativity = prompt(input, "associativity", |s| {
            s.parse::<usize>()
                .ok()
                .filter(|&e| check_associativity(e).is_ok())
        })?;
        let replacement_policy: ReplacementPolicy =
            prompt(input, "replacement policy", policy)?;
        let write_hit_policy: WriteHitPolicy = prompt(input, "write hit policy", policy)?;
        let write_miss_policy: WriteMissPolicy = prompt(input, "write miss policy", policy)?;
        let config = CacheConfig {
            ram_size,
            cache_size,
            block_size,
            associativity,
            replacement_policy,
            write_hit_policy,
            write_miss_policy,
        };
        match Geometry::new(&config) {
            Ok(_) => {
                println!("cache successfully configured!");
                return Ok(config);
            }
            Err(e) => println!("ERROR: {e}"),
        }
    }
}

fn print_menu() {
    println!("*** Cache simulator menu ***");
    println!("type one command:");
    println!("1. cache-read");
    println!("2. cache-write");
    println!("3. cache-flush");
    println!("4. cache-view");
    println!("5. memory-view");
    println!("6. cache-dump");
    println!("7. memory-dump");
    println!("8. quit");
    println!("****************************");
}

fn dump_to(path: &Path, dump: impl FnOnce(BufWriter<File>) -> std::io::Result<()>) -> Result<()> {
    let file = File::create(path)?;
    dump(BufWriter::new(file))?;
    log::info!("dumped to {}", path.display());
    Ok(())
}

fn run_command(sim: &mut Simulator, command: Command<'_>) -> Result<()> {
    match command {
        Command::Read(a) => match sim.read_hex(a) {
            Ok(r) => println!("{r}"),
            Err(e) => println!("ERROR: {e}"),
        },
        Command::Write(a, b) => match sim.write_hex(a, b) {
            Ok(w) => println!("{w}"),
            Err(e) => println!("ERROR: {e}"),
        },
        Command::Flush => {
            match sim.flush() {
                Ok(()) => println!("cache_cleared"),
                Err(e) => println!("ERROR: {e}"),
            }
        }
        Command::CacheView { json: false } => println!("{}", sim.cache_snapshot()),
        Command::CacheView { json: true } => {
            println!("{}", serde_json::to_string_pretty(&sim.cache_snapshot())?)
        }
        Command::MemoryView { json: false } => println!("{}", sim.memory_snapshot()),
        Command::MemoryView { json: true } => {
            println!("{}", serde_json::to_string_pretty(&sim.memory_snapshot())?)
        }
        Command::CacheDump(p) => {
            let snapshot = sim.cache_snapshot();
            let path = Path::new(p.unwrap_or(DEFAULT_CACHE_DUMP));
            if let Err(e) = dump_to(path, |w| dump_cache(&snapshot, w)) {
                println!("ERROR: cannot dump cache to {}: {e}", path.display());
            }
        }
        Command::MemoryDump(p) => {
            let snapshot = sim.memory_snapshot();
            let path = Path::new(p.unwrap_or(DEFAULT_MEMORY_DUMP));
            if let Err(e) = dump_to(path, |w| dump_memory(&snapshot, w)) {
                println!("ERROR: cannot dump memory to {}: {e}", path.display());
            }
        }
        Command::Help | Command::Quit => (),
    }
    Ok(())
}

/// Serves menu commands until `quit` or end of input.
pub fn execute_interactive(sim: &mut Simulator, input: &mut impl BufRead) -> Result<()> {
    print_menu();
    while let Some(line) = read_line(input)? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = match command::parse_command(&line) {
            Ok(p) => p,
            Err(e) => {
                println!("parse error: expected {}", e.expected);
                continue;
            }
        };
        if parsed == Command::Quit {
            break;
        }
        run_command(sim, parsed)?;
        print_menu();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            Command::Read("0x05"),
            command::parse_command("cache-read 0x05\n").unwrap()
        );
        assert_eq!(
            Command::Write("0x10", "0xAB"),
            command::parse_command("  cache-write 0x10   0xAB  ").unwrap()
        );
        // values are checked by the simulator, not the grammar
        assert_eq!(
            Command::Read("zz"),
            command::parse_command("cache-read zz").unwrap()
        );
        assert!(command::parse_command("cache-read").is_err());
        assert!(command::parse_command("cache-write 0x10").is_err());
    }
    #[test]
    fn test_parse_views_and_dumps() {
        assert_eq!(
            Command::Flush,
            command::parse_command("cache-flush").unwrap()
        );
        assert_eq!(
            Command::CacheView { json: false },
            command::parse_command("cache-view\n").unwrap()
        );
        assert_eq!(
            Command::MemoryView { json: true },
            command::parse_command("memory-view json").unwrap()
        );
        assert_eq!(
            Command::CacheDump(None),
            command::parse_command("cache-dump \n").unwrap()
        );
        assert_eq!(
            Command::MemoryDump(Some("out/ram.txt")),
            command::parse_command("memory-dump out/ram.txt").unwrap()
        );
        assert_eq!(
            Command::Quit,
            command::parse_command("quit\n").unwrap()
        );
        assert!(command::parse_command("cache-explode").is_err());
    }
    #[test]
    fn test_parse_init_ram() {
        assert_eq!(
            ("0x00", "0xFF"),
            command::init_ram("init-ram 0x00 0xFF\n").unwrap()
        );
        assert_eq!(
            ("0x00", "0x7F"),
            command::init_ram("init 0x00 0x7F").unwrap()
        );
        assert!(command::init_ram("init-ram 0x00").is_err());
    }
    #[test]
    fn test_ram_range_reprompts() {
        let answers = "\
init-ram 0x0 0xFFFFFFFFFFFFFFFF
init-ram 0x10 0x0F
init-ram 0x00 0x1FF
init-ram 0x00 0x0E
init-ram 0x00 0x3F
";
        assert_eq!(64, prompt_ram_size(&mut answers.as_bytes()).unwrap());
        assert!(prompt_ram_size(&mut "init-ram 0x0 0xFFFFFFFFFFFFFFFF\n".as_bytes()).is_err());
    }
    #[test]
    fn test_configure_dialogue() {
        let answers = "\
init-ram 0x00 0xFF
4
32
8
3
1
2
9
2
1
";
        let mut input = answers.as_bytes();
        let c = configure(&mut input).unwrap();
        assert_eq!(
            CacheConfig {
                ram_size: 256,
                cache_size: 32,
                block_size: 8,
                associativity: 1,
                replacement_policy: ReplacementPolicy::Lru,
                write_hit_policy: WriteHitPolicy::WriteBack,
                write_miss_policy: WriteMissPolicy::WriteAllocate,
            },
            c
        );
    }
    #[test]
    fn test_configure_restarts_on_inconsistent_geometry() {
        // 8-byte cache cannot hold 4 ways of 4 bytes
        let answers = "\
init-ram 0x00 0x3F
8
4
4
2
2
2
16
4
4
1
1
1
";
        let mut input = answers.as_bytes();
        let c = configure(&mut input).unwrap();
        assert_eq!((64, 16, 4, 4), (c.ram_size, c.cache_size, c.block_size, c.associativity));
        assert!(configure(&mut "init-ram 0x00 0xFF\n".as_bytes()).is_err());
    }
    #[test]
    fn test_session_runs_until_quit() {
        let config = CacheConfig {
            ram_size: 256,
            cache_size: 32,
            block_size: 8,
            associativity: 1,
            replacement_policy: ReplacementPolicy::Lru,
            write_hit_policy: WriteHitPolicy::WriteBack,
            write_miss_policy: WriteMissPolicy::WriteAllocate,
        };
        let mut sim = Simulator::with_seed(config, &[], 0).unwrap();
        let script = "cache-write 0x05 0xAB\nbogus\ncache-read 0x100\ncache-read 0x05\nquit\ncache-read 0x06\n";
        execute_interactive(&mut sim, &mut script.as_bytes()).unwrap();
        let c = sim.counters();
        assert_eq!((1, 1), (c.hits, c.misses));
    }
}
