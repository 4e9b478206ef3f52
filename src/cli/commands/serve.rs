//! Serve command - bridge watches over stdin/stdout.

use std::rc::Rc;

use crate::config::Settings;
use crate::session::{Canonicalizer, Session, StdioSession, serve};
use crate::types::FileWatcherEventKind;
use crate::watcher::{Disposer, WatchFactory};

/// Arguments for the serve command.
pub struct ServeArgs {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
    pub recursive_dirs: Vec<String>,
    pub case_insensitive: bool,
}

/// Run the serve command.
///
/// Every watched path gets a callback that logs the changes it receives.
/// Runs until stdin closes, then closes all watches.
pub async fn run(args: ServeArgs, config: &Settings) -> anyhow::Result<()> {
    let case_sensitive = config.session.case_sensitive_paths && !args.case_insensitive;
    let (session, events) = StdioSession::new(
        Canonicalizer::new(case_sensitive),
        config.transport.channel_capacity,
    );
    let session = Rc::new(session);

    let factory = WatchFactory::new();
    factory.create(Some(session.clone() as Rc<dyn Session>))?;

    let watchers = subscribe_all(&factory, &args)?;
    crate::log_event!(
        "serve",
        "ready",
        "{} watches, case sensitive: {case_sensitive}",
        factory.stats().total()
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(&session, events, stdin, tokio::io::stdout(), || {
        for watcher in &watchers {
            watcher.close();
        }
    })
    .await?;

    let stats = factory.stats();
    crate::log_event!(
        "serve",
        "stopped",
        "{} ids allocated, {} watches still open",
        stats.allocated_ids,
        stats.total()
    );
    Ok(())
}

fn subscribe_all(factory: &WatchFactory, args: &ServeArgs) -> anyhow::Result<Vec<Disposer>> {
    let mut watchers = Vec::new();

    for path in &args.files {
        watchers.push(factory.watch_file(
            path,
            Rc::new(|changed: &str, kind: FileWatcherEventKind| {
                crate::log_event!("serve", "file changed", "{changed} {kind:?}");
            }),
        )?);
    }

    let directories = args
        .dirs
        .iter()
        .map(|path| (path, false))
        .chain(args.recursive_dirs.iter().map(|path| (path, true)));
    for (path, recursive) in directories {
        watchers.push(factory.watch_directory(
            path,
            Rc::new(move |changed: &str| {
                crate::log_event!("serve", "directory changed", "{changed} recursive={recursive}");
            }),
            recursive,
        )?);
    }

    Ok(watchers)
}
