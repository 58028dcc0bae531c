//! Index command implementation.

use crate::assistant::{build_embedder, build_vector_store};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::indexer::Indexer;
use anyhow::Result;

/// Build or refresh the document index.
pub async fn run_index(rebuild: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if !settings.index.cache {
        Output::warning("index.cache is off; the index will not outlive this command.");
    }

    let embedder = build_embedder(&settings)?;
    let vector_store = build_vector_store(&settings)?;
    let indexer = Indexer::from_settings(&settings, embedder, vector_store.clone())?;

    let spinner = Output::spinner(&format!(
        "Indexing {}...",
        settings.input_dir().display()
    ));
    let report = if rebuild {
        indexer.rebuild().await
    } else {
        indexer.build().await
    };
    spinner.finish_and_clear();

    Output::index_report(&report?);

    let documents = vector_store.list_documents().await?;
    if !documents.is_empty() {
        Output::header("Documents");
        for document in documents {
            Output::list_item(&format!(
                "{} ({} nodes)",
                document.document_id, document.node_count
            ));
        }
    }

    Ok(())
}
