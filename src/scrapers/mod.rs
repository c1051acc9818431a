pub mod browser;
pub mod degewo;
pub mod howoge;
pub mod html;
pub mod openimmo;
pub mod traits;
pub mod types;

use std::sync::Arc;

use anyhow::Result;

use crate::models::Source;
use browser::BrowserSession;
use degewo::Degewo;
use howoge::Howoge;
use openimmo::OpenImmo;

pub use traits::SourceAdapter;
pub use types::BrowserOptions;

/// Build one adapter per requested source, each with its own browser session.
/// New housing companies are registered here.
pub fn build_adapters(sources: &[Source], options: &BrowserOptions) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(sources.len());

    for &source in sources {
        let session = BrowserSession::new(options.clone());
        let adapter: Arc<dyn SourceAdapter> = match source {
            Source::Degewo => Arc::new(Degewo::new(session)),
            Source::Gewobag => Arc::new(OpenImmo::gewobag(session)?),
            Source::Howoge => Arc::new(Howoge::new(session)),
            Source::Wbm => Arc::new(OpenImmo::wbm(session)?),
        };
        adapters.push(adapter);
    }

    Ok(adapters)
}
