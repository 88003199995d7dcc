use std::fmt;

pub trait Stat {
    fn view(&self, max_width: usize) -> Box<dyn StatView + '_>;
}

pub trait StatView: fmt::Display {
    /// header of stat
    fn header(&self) -> &'static str;
    /// body width
    fn width(&self) -> usize;
}

pub trait AddStats {
    /// add stat to `buf`.
    fn add_stats(&self, buf: &mut Stats);
}

#[derive(Default)]
pub struct Stats {
    stats: Vec<Box<dyn Stat>>,
}

impl Stats {
    pub fn push(&mut self, stat: Box<dyn Stat>) {
        self.stats.push(stat)
    }
    pub fn view(&self, max_width: usize) -> StatAllView<'_> {
        StatAllView {
            views: self.stats.iter().map(|s| s.view(max_width)).collect(),
            max_width,
        }
    }
}

pub struct StatAllView<'s> {
    views: Vec<Box<dyn StatView + 's>>,
    max_width: usize,
}

impl fmt::Display for StatAllView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .views
            .iter()
            .map(|s| s.header().len().max(s.width()))
            .max()
            .unwrap_or(0)
            .min(self.max_width);
        writeln!(f, "{:-^width$}", " statistics ")?;
        for sv in &self.views {
            writeln!(f, "{}:", sv.header())?;
            writeln!(f, "{}", sv)?;
        }
        write!(f, "{:-<width$}", "")
    }
}

/// Hit/miss totals of one simulator.
#[derive(Clone, Copy, Default)]
pub struct CacheStat {
    hits: usize,
    misses: usize,
}

impl CacheStat {
    pub fn new(hits: usize, misses: usize) -> Self {
        Self { hits, misses }
    }
    pub fn accesses(&self) -> usize {
        self.hits + self.misses
    }
    /// `None` before the first access.
    pub fn hit_rate(&self) -> Option<f64> {
        match self.accesses() {
            0 => None,
            n => Some(self.hits as f64 / n as f64),
        }
    }
}

impl Stat for CacheStat {
    fn view(&self, _: usize) -> Box<dyn StatView + '_> {
        Box::new(self)
    }
}

impl StatView for &'_ CacheStat {
    fn header(&self) -> &'static str {
        "cache access count"
    }
    fn width(&self) -> usize {
        26
    }
}

impl fmt::Display for &'_ CacheStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  hits: {:>16}", self.hits)?;
        writeln!(f, "  misses: {:>14}", self.misses)?;
        writeln!(f, "  accesses: {:>12}", self.accesses())?;
        let rate = match self.hit_rate() {
            Some(r) => format!("{:.2} %", r * 100.0),
            None => "-".to_owned(),
        };
        write!(f, "  hit rate: {rate:>12}")
    }
}
