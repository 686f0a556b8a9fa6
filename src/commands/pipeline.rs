use crate::gene::{stream_genes_into_channel, Gene, SampleTable};
use crate::utils::{Error, FaidxGenome, GenomeProvider, Result, TsvWriter};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self},
};

#[derive(Debug, Clone)]
struct ThreadContextParams {
    genome_path: Option<PathBuf>,
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
}

fn create_thread_local_genome() -> Option<FaidxGenome> {
    let path = CTX_PARAMS.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .and_then(|ctx| ctx.genome_path.clone())
    })?;
    match FaidxGenome::from_path(&path) {
        Ok(genome) => Some(genome),
        Err(e) => {
            log::error!(
                "Failed to open genome {} on thread {:?}: {}",
                path.display(),
                std::thread::current().id(),
                e
            );
            None
        }
    }
}

thread_local! {
    static THREAD_GENOME: Option<FaidxGenome> = create_thread_local_genome();
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

/// Shared settings of the per-gene commands.
pub struct PipelineParams<'a> {
    pub catalog_path: &'a Path,
    pub samples: Arc<SampleTable>,
    pub genome_path: Option<PathBuf>,
    pub num_threads: usize,
}

/// Streams the genes of the catalog through `process` on a thread pool and
/// writes the returned lines with `writer`.
///
/// `process` receives the genome when `genome_path` is set. Genes whose
/// processing fails are logged and skipped.
pub fn run_gene_pipeline<F>(params: PipelineParams, mut writer: TsvWriter, process: F) -> Result<()>
where
    F: Fn(Gene, Option<&dyn GenomeProvider>) -> Result<Vec<String>> + Sync,
{
    if let Some(path) = &params.genome_path {
        // fail early, worker threads only log
        FaidxGenome::from_path(path)?;
    }

    let (sender_gene, receiver_gene) = bounded(CHANNEL_BUFFER_SIZE);
    let catalog_path = params.catalog_path.to_path_buf();
    let samples = params.samples.clone();
    let gene_stream_thread =
        thread::spawn(move || stream_genes_into_channel(&catalog_path, samples, sender_gene));

    let (sender_result, receiver_result) = bounded::<Vec<String>>(CHANNEL_BUFFER_SIZE);
    let writer_thread = thread::spawn(move || {
        let mut n_lines = 0;
        for lines in &receiver_result {
            if let Err(e) = writer.write_lines(&lines) {
                log::error!("Failed to write output: {}", e);
            }
            n_lines += lines.len();
        }
        n_lines
    });

    log::debug!(
        "Initializing thread pool with {} threads...",
        params.num_threads
    );
    let pool = initialize_thread_pool(
        params.num_threads,
        ThreadContextParams {
            genome_path: params.genome_path.clone(),
        },
    )?;
    pool.install(|| {
        receiver_gene
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_result, |s, gene_result| match gene_result {
                Ok(gene) => process_gene(gene, &process, s),
                Err(err) => log::error!("Gene processing: {:#}", err),
            });
    });

    // Clean-up
    drop(sender_result);
    let n_lines = writer_thread.join().expect("Writer thread panicked");
    log::trace!("Writer thread finished");
    gene_stream_thread
        .join()
        .expect("Gene stream thread panicked");
    log::trace!("Gene stream thread finished");
    log::info!("Wrote {} records", n_lines);

    Ok(())
}

fn process_gene<F>(gene: Gene, process: &F, sender_result: &Sender<Vec<String>>)
where
    F: Fn(Gene, Option<&dyn GenomeProvider>) -> Result<Vec<String>>,
{
    THREAD_GENOME.with(|genome| {
        let gene_id = gene.id.clone();
        let genome = genome.as_ref().map(|g| g as &dyn GenomeProvider);
        match process(gene, genome) {
            Ok(lines) => {
                if lines.is_empty() {
                    return;
                }
                if let Err(e) = sender_result.send(lines) {
                    log::error!("Failed to send gene result to writer thread: {}", e);
                }
            }
            Err(err) => {
                log::error!("Error analyzing gene {}: {}", gene_id, err);
            }
        }
    });
}

/// Genome of the worker thread, or an error for commands that need one.
pub fn require_genome(genome: Option<&dyn GenomeProvider>) -> Result<&dyn GenomeProvider> {
    genome.ok_or_else(|| Error::Genome("Genome is not available on this thread".to_string()))
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("isograph-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| Error::Config(format!("Failed to initialize thread pool: {}", e)))
}
