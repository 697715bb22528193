// Procedure Execution Engine - validates a (procedure, dataset) pair, builds
// the argument payload and dispatches to the interpreter for its language

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::config::ExecutionSettings;
use crate::dataset::Dataset;
use crate::error::{ExecutionError, Result};
use crate::interpreter::InterpreterRegistry;
use crate::payload::Payload;
use crate::procedure::{check_extension, Procedure};
use crate::process::{OutputStream, RunOptions};

/// Entry point for running procedures.
///
/// Safe to share between tasks: each call owns its own process and output
/// stream. When `max_concurrent` is configured, callers beyond the limit wait
/// for a running procedure to finish before theirs is spawned.
pub struct ProcedureEngine {
    registry: Arc<InterpreterRegistry>,
    settings: ExecutionSettings,
    semaphore: Option<Arc<Semaphore>>,
    spawned: AtomicU64,
}

impl ProcedureEngine {
    pub fn new(registry: Arc<InterpreterRegistry>, settings: ExecutionSettings) -> Self {
        let semaphore = settings
            .max_concurrent
            .map(|limit| Arc::new(Semaphore::new(limit)));
        Self {
            registry,
            settings,
            semaphore,
            spawned: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &InterpreterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Number of subprocesses spawned over the engine's lifetime
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Run `procedure` against `dataset`.
    ///
    /// Validation failures (unknown language, extension mismatch) return
    /// immediately without spawning anything. Everything that goes wrong with
    /// the process itself, including a missing script or interpreter, is
    /// reported as the terminal `Err` item of the returned stream.
    pub async fn execute(
        &self,
        procedure: &Procedure,
        dataset: &Dataset,
        extra_args: &[String],
    ) -> Result<OutputStream> {
        let span = crate::logging::utils::procedure_span(
            &procedure.name,
            &procedure.language,
            &dataset.id.to_string(),
        );
        self.execute_inner(procedure, dataset, extra_args)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        procedure: &Procedure,
        dataset: &Dataset,
        extra_args: &[String],
    ) -> Result<OutputStream> {
        let interpreter = self.registry.resolve(&procedure.language)?;
        check_extension(&procedure.script, &procedure.language, interpreter.extension())?;

        let payload = Payload::from_dataset(dataset).to_wire()?;

        if !procedure.script.is_file() {
            tracing::warn!(script = %procedure.script.display(), "Procedure script is missing");
            return Ok(OutputStream::failed(
                procedure.language.clone(),
                ExecutionError::SpawnFailed {
                    command: procedure.language.clone(),
                    error: format!("script not found: {}", procedure.script.display()),
                    suggestion: Some("Check that the procedure file is still stored".to_string()),
                }
                .into(),
            ));
        }

        let permit = match &self.semaphore {
            Some(semaphore) => {
                tracing::debug!(
                    available = semaphore.available_permits(),
                    "Waiting for an execution slot"
                );
                let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                    ExecutionError::SpawnFailed {
                        command: procedure.language.clone(),
                        error: e.to_string(),
                        suggestion: None,
                    }
                })?;
                Some(permit)
            }
            None => None,
        };

        let options = RunOptions {
            timeout: self.settings.timeout(),
            stderr_tail_bytes: self.settings.stderr_tail_bytes,
        };
        let mut stream = interpreter.run(&procedure.script, &payload, extra_args, &options);
        if !stream.is_spawned() {
            return Ok(stream);
        }
        self.spawned.fetch_add(1, Ordering::SeqCst);

        crate::logging::utils::log_procedure_start(&procedure.name, &procedure.script, stream.command());

        if let Some(permit) = permit {
            stream.hold_permit(permit);
        }
        Ok(stream)
    }
}
