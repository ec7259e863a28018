/*! Corpus reader

Chains the lines of several locations into a single forward-only stream.
!*/
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Error;

use super::LineReader;

/// Hook invoked when a location starts streaming.
pub type OnEnterLocation<'a> = Box<dyn FnMut(&Path) + 'a>;

/// Streams the lines of each location in turn.
///
/// Locations are opened lazily, so a missing file is only reported when the stream reaches it.
pub struct Corpus<'a> {
    locations: VecDeque<PathBuf>,
    current: Option<LineReader>,
    on_enter_location: Option<OnEnterLocation<'a>>,
}

impl<'a> Corpus<'a> {
    pub fn new<P: AsRef<Path>>(locations: &[P]) -> Self {
        Self {
            locations: locations.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            current: None,
            on_enter_location: None,
        }
    }

    /// Sets a hook that gets called exactly once per location, before its first line is read.
    pub fn on_enter_location(mut self, hook: impl FnMut(&Path) + 'a) -> Self {
        self.on_enter_location = Some(Box::new(hook));
        self
    }

    /// Logs each location as it is entered.
    pub fn with_logging(self) -> Self {
        self.on_enter_location(|location| info!("Reading dataset {:?}", location))
    }
}

impl<'a> Iterator for Corpus<'a> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(reader) = &mut self.current {
                match reader.next() {
                    Some(line) => return Some(line),
                    None => self.current = None,
                }
            }

            let location = self.locations.pop_front()?;
            if let Some(hook) = &mut self.on_enter_location {
                hook(&location);
            }
            match LineReader::open(&location) {
                Ok(reader) => self.current = Some(reader),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
