use anyhow::{bail, Context, Result};

use crate::fetch::Fetcher;
use crate::records::Record;

pub struct ActionDispatcher<'a> {
    fetcher: &'a Fetcher,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self { fetcher }
    }

    /// Returns false when a fetch is already running and the request was dropped.
    pub fn reload(&self) -> bool {
        self.fetcher.request()
    }

    pub fn open_link(&self, record: &Record) -> Result<()> {
        let Some(link) = record.link.as_deref() else {
            bail!("no link for {}", record.name);
        };
        tracing::info!(name = %record.name, %link, "opening link");
        open::that(link).with_context(|| format!("opening {link}"))
    }
}
