//! Wiring for the `docqa` binary: builds every component from `Settings`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::traits::{Embedder, VectorStore};
use docqa_core::types::DocumentRecord;
use docqa_embed::build_embedder;
use docqa_ingest::{is_supported, load_pages};
use docqa_retrieval::{
    new_document_id, AnswerService, DocumentLibrary, GeminiGenerator, InMemoryConversationStore, JsonDocumentStore,
    Retriever,
};
use docqa_vector::LanceVectorStore;

/// `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Supported files under `paths`, directories walked recursively. Sorted,
/// duplicates removed.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|p| WalkDir::new(p).follow_links(true).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.file_type().is_file() && is_supported(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files.dedup();
    files
}

pub struct App {
    pub settings: Settings,
    store: Arc<LanceVectorStore>,
    library: DocumentLibrary<LanceVectorStore, JsonDocumentStore>,
    retriever: Arc<Retriever<LanceVectorStore>>,
}

impl App {
    pub async fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let embedder: Arc<dyn Embedder> = Arc::from(build_embedder(&settings.embedding).context("loading embedder")?);

        let dir = settings.index.dir_path();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let store = Arc::new(LanceVectorStore::open(&dir.to_string_lossy(), &settings.index.table, embedder.dim()).await?);
        let registry = Arc::new(JsonDocumentStore::open(settings.index.registry_path())?);

        let library = DocumentLibrary::new(store.clone(), registry, embedder.clone(), Chunker::new(settings.chunking)?)
            .with_batch_size(settings.embedding.batch_size);
        let retriever = Arc::new(Retriever::new(store.clone(), embedder, settings.retrieval.clone()));
        info!(index = %dir.display(), table = %settings.index.table, "docqa ready");
        Ok(Self { settings, store, library, retriever })
    }

    pub fn library(&self) -> &DocumentLibrary<LanceVectorStore, JsonDocumentStore> {
        &self.library
    }

    pub fn retriever(&self) -> &Retriever<LanceVectorStore> {
        &self.retriever
    }

    pub fn answer_service(&self) -> Result<AnswerService<LanceVectorStore>> {
        let generator = GeminiGenerator::new(&self.settings.generation)?;
        Ok(AnswerService::new(
            self.retriever.clone(),
            Arc::new(generator),
            Arc::new(InMemoryConversationStore::default()),
        ))
    }

    /// Extract, chunk, embed and index one file under a fresh document id.
    pub async fn ingest_file(&self, path: &Path) -> Result<DocumentRecord> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid file name: {}", path.display()))?;
        let pages = load_pages(path)?;
        let record = self.library.ingest(&new_document_id(), filename, &pages).await?;
        Ok(record)
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    pub async fn close(self) -> Result<()> {
        let Self { store, library, retriever, .. } = self;
        drop(library);
        drop(retriever);
        match Arc::try_unwrap(store) {
            Ok(store) => store.close().await?,
            Err(_) => debug!("vector store still shared at shutdown"),
        }
        Ok(())
    }
}
