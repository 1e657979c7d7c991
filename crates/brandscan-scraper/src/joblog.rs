//! Per-job execution log.
//!
//! Every job runs inside a `job_log` span whose `log_file` field names a
//! plain-text file next to the dataset artifact. [`JobLogLayer`] routes every
//! event recorded inside that span, from any module, to a `fmt` layer writing
//! that file. The file is uploaded with the dataset.
//!
//! Binaries install the layer once in their subscriber:
//!
//! ```ignore
//! tracing_subscriber::registry()
//!     .with(JobLogLayer::default())
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(env_filter)
//!     .init();
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Span, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

const JOB_LOG_SPAN: &str = "job_log";
const LOG_FILE_FIELD: &str = "log_file";

type FileLayer<S> = tracing_subscriber::fmt::Layer<S, DefaultFields, Format<Full>, RollingFileAppender>;

/// Opens the span that scopes one job's log file.
#[must_use]
pub fn job_log_span(log_file: &Path, brand: &str, job_id: &str, run_code: &str) -> Span {
    tracing::info_span!(
        "job_log",
        log_file = %log_file.display(),
        brand = %brand,
        job_id = %job_id,
        run_code = %run_code
    )
}

/// Routes events inside a `job_log` span to that job's file.
pub struct JobLogLayer<S> {
    _subscriber: PhantomData<fn(S)>,
}

impl<S> Default for JobLogLayer<S> {
    fn default() -> Self {
        Self {
            _subscriber: PhantomData,
        }
    }
}

impl<S> fmt::Debug for JobLogLayer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLogLayer").finish()
    }
}

/// Stored in the `job_log` span's extensions; dropped, and the file closed,
/// when the span closes.
struct JobLogSink<S>(Arc<FileLayer<S>>);

#[derive(Default)]
struct LogFileVisitor {
    path: Option<String>,
}

impl Visit for LogFileVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == LOG_FILE_FIELD {
            self.path = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == LOG_FILE_FIELD {
            self.path = Some(format!("{value:?}"));
        }
    }
}

fn file_layer<S>(path: &Path) -> Option<FileLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let dir = path.parent()?;
    let file_name = path.file_name()?.to_str()?;
    let appender = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("job log {} could not be opened: {e}", path.display());
            return None;
        }
    };
    Some(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(appender),
    )
}

impl<S> JobLogLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn sink_for(id: &Id, ctx: &Context<'_, S>) -> Option<Arc<FileLayer<S>>> {
        let span = ctx.span(id)?;
        for ancestor in span.scope() {
            if let Some(sink) = ancestor.extensions().get::<JobLogSink<S>>() {
                return Some(Arc::clone(&sink.0));
            }
        }
        None
    }

    fn event_sink(event: &Event<'_>, ctx: &Context<'_, S>) -> Option<Arc<FileLayer<S>>> {
        let scope = ctx.event_scope(event)?;
        for span in scope {
            if let Some(sink) = span.extensions().get::<JobLogSink<S>>() {
                return Some(Arc::clone(&sink.0));
            }
        }
        None
    }
}

impl<S> Layer<S> for JobLogLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != JOB_LOG_SPAN {
            if let Some(sink) = Self::sink_for(id, &ctx) {
                sink.on_new_span(attrs, id, ctx);
            }
            return;
        }

        let mut visitor = LogFileVisitor::default();
        attrs.record(&mut visitor);
        let Some(sink) = visitor
            .path
            .as_deref()
            .and_then(|path| file_layer::<S>(Path::new(path)))
        else {
            return;
        };
        let sink = Arc::new(sink);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(JobLogSink(Arc::clone(&sink)));
        }
        sink.on_new_span(attrs, id, ctx);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        if let Some(sink) = Self::sink_for(id, &ctx) {
            sink.on_record(id, values, ctx);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if let Some(sink) = Self::event_sink(event, &ctx) {
            sink.on_event(event, ctx);
        }
    }
}
