use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Result;
use doping_template::ParameterMap;
use tracing::{debug, error, info};

use super::cache::{CacheStats, SpecializationCache};
use super::specialization::{DynamicFunction, LoopDescriptor, SpecializationKey};
use crate::codegen::{ArgPack, Arguments, CompilationPipeline};
use crate::config::{LogSettings, RuntimeConfig};
use crate::error::SpecializationError;
use crate::utils::logger;

/// Owns everything one driver of the engine needs: configuration, the
/// compilation pipeline, the cache of built specializations and the guard
/// that blocks nested attempts.
///
/// A context is deliberately not `Sync`. Each thread that drives loops needs
/// its own.
///
/// No borrow of the cache is held while a specialized body runs, so a body
/// may call back into the context.
pub struct SpecializationContext {
    config: RuntimeConfig,
    pipeline: CompilationPipeline,
    cache: RefCell<SpecializationCache<Rc<DynamicFunction>>>,
    in_flight: Cell<bool>,
    stats: EngineStats,
    benchmark_out: RefCell<Box<dyn Write>>,
}

impl fmt::Debug for SpecializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializationContext")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Default for SpecializationContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl SpecializationContext {
    pub fn new(config: RuntimeConfig) -> Self {
        let pipeline = CompilationPipeline::from_config(&config);
        Self::with_pipeline(config, pipeline)
    }

    pub fn with_pipeline(config: RuntimeConfig, pipeline: CompilationPipeline) -> Self {
        Self {
            config,
            pipeline,
            cache: RefCell::new(SpecializationCache::new()),
            in_flight: Cell::new(false),
            stats: EngineStats::default(),
            benchmark_out: RefCell::new(Box::new(std::io::stdout())),
        }
    }

    /// Sends the benchmark timings somewhere other than stdout.
    pub fn with_benchmark_output(self, out: impl Write + 'static) -> Self {
        self.benchmark_out.replace(Box::new(out));
        self
    }

    /// Reads `DOPING_*` variables and installs the log subscriber.
    ///
    /// The subscriber goes in first so that settings falling back to their
    /// defaults are reported.
    pub fn from_env() -> Result<Self> {
        logger::init_logging(&LogSettings::from_env())?;
        let config = RuntimeConfig::from_env()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &CompilationPipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> EngineSnapshot {
        self.stats.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    pub fn is_cached(&self, key: &SpecializationKey) -> bool {
        self.cache.borrow().contains(key)
    }

    /// True while a specialization attempt or specialized body is running.
    pub fn is_specializing(&self) -> bool {
        self.in_flight.get()
    }

    /// Called from the hot loop. Returns `0` when a specialized body ran the
    /// loop to completion, otherwise `continue_condition` unchanged.
    pub fn specialize(
        &self,
        current_iteration: i64,
        continue_condition: i32,
        descriptor: &LoopDescriptor<'_>,
        arguments: &mut Arguments<'_>,
    ) -> i32 {
        let mut pack = arguments.as_pack();
        self.specialize_packed(current_iteration, continue_condition, descriptor, &mut pack)
    }

    pub fn specialize_packed(
        &self,
        current_iteration: i64,
        continue_condition: i32,
        descriptor: &LoopDescriptor<'_>,
        pack: &mut ArgPack,
    ) -> i32 {
        self.stats.invocations.fetch_add(1, Ordering::Relaxed);

        if continue_condition == 0 {
            self.stats.finished.fetch_add(1, Ordering::Relaxed);
            return continue_condition;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            self.stats.reentrant.fetch_add(1, Ordering::Relaxed);
            debug!(
                loop_name = descriptor.display_name(),
                "nested specialization refused"
            );
            return continue_condition;
        };

        let progress = descriptor.progress(current_iteration);
        debug!(
            loop_name = descriptor.display_name(),
            current_iteration,
            progress_pct = 100.0 * progress,
            parameters = descriptor.parameters,
            compiler = descriptor.compiler_command,
            "specialization requested"
        );

        let parameters = match ParameterMap::parse(descriptor.parameters) {
            Ok(parameters) => parameters,
            Err(err) => {
                self.report_failure(descriptor, &err.into());
                return continue_condition;
            }
        };
        let key = SpecializationKey::new(descriptor.name, &parameters, descriptor.source);

        let mut cache = self.cache.borrow_mut();
        let hit = cache.contains(&key);

        if !hit && !self.config.policy.should_specialize(progress) {
            self.stats.deferred.fetch_add(1, Ordering::Relaxed);
            info!(
                loop_name = descriptor.display_name(),
                progress_pct = 100.0 * progress,
                "too far into the loop, keeping baseline"
            );
            return continue_condition;
        }

        let started = Instant::now();
        let built = cache
            .get_or_create(key, || -> Result<_, SpecializationError> {
                let mut function = DynamicFunction::with_parameters(descriptor.source, parameters)?;
                function.compile_and_link(&self.pipeline, descriptor.compiler_command)?;
                Ok(Rc::new(function))
            })
            .map(Rc::clone);
        drop(cache);
        let function = match built {
            Ok(function) => function,
            Err(err) => {
                self.report_failure(descriptor, &err);
                return continue_condition;
            }
        };

        if hit {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(loop_name = descriptor.display_name(), "reusing specialized function");
        } else {
            self.stats.specialized.fetch_add(1, Ordering::Relaxed);
            let elapsed = started.elapsed();
            info!(
                loop_name = descriptor.display_name(),
                current_iteration,
                elapsed_s = elapsed.as_secs_f64(),
                "render, compile and link finished"
            );
            if self.config.benchmark {
                self.benchmark_line("DopingRuntime", elapsed.as_secs_f64());
            }
        }

        let started = Instant::now();
        let status = match function.run_packed(current_iteration, pack) {
            Ok(status) => status,
            Err(err) => {
                self.report_failure(descriptor, &err);
                return continue_condition;
            }
        };
        debug!(
            loop_name = descriptor.display_name(),
            status, "specialized function returned"
        );
        if self.config.benchmark {
            self.benchmark_line("DynFunction", started.elapsed().as_secs_f64());
        }

        0
    }

    fn report_failure(&self, descriptor: &LoopDescriptor<'_>, err: &SpecializationError) {
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        error!(
            loop_name = descriptor.display_name(),
            kind = %err.kind(),
            "failed to specialize loop: {err}"
        );
        error!("continuing with baseline code");
    }

    fn benchmark_line(&self, label: &str, seconds: f64) {
        let Ok(mut out) = self.benchmark_out.try_borrow_mut() else {
            return;
        };
        let _ = write!(out, "{label}: {seconds} ");
        let _ = out.flush();
    }
}

/// Holds the in-flight flag for the duration of one attempt.
struct InFlightGuard<'a>(&'a Cell<bool>);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Debug, Default)]
pub struct EngineStats {
    invocations: AtomicU64,
    finished: AtomicU64,
    reentrant: AtomicU64,
    deferred: AtomicU64,
    cache_hits: AtomicU64,
    specialized: AtomicU64,
    failed: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            reentrant: self.reentrant.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            specialized: self.specialized.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub invocations: u64,
    /// Calls made after the loop had already finished.
    pub finished: u64,
    /// Calls refused because another attempt was in flight.
    pub reentrant: u64,
    /// Misses skipped by the progress policy.
    pub deferred: u64,
    pub cache_hits: u64,
    pub specialized: u64,
    pub failed: u64,
}
