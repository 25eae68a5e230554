//! End-to-end tests for the request pipeline

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tickload::loaders::{TextLoader, TEXT};
use tickload::prelude::*;
use tickload::{LoaderRegistry, SourceFactory};

const JOINED: AssetType = AssetType::new("joined");

fn manager() -> AssetManager {
    AssetManager::builder().register_loader(TEXT, TextLoader).build()
}

/// Source wrapper counting open and close calls
struct CountingSource {
    inner: MemorySource,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Source for CountingSource {
    fn open(&mut self) -> LoadResult<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.open()
    }

    fn stream(&mut self) -> LoadResult<&mut dyn Read> {
        self.inner.stream()
    }

    fn close(&mut self) {
        if self.inner.is_open() {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

/// Factory serving part bodies from a fixed table; unknown paths fail to open
fn table_factory(entries: &[(&str, &str)]) -> impl SourceFactory + 'static {
    let table: Vec<(String, String)> = entries
        .iter()
        .map(|(p, b)| (p.to_string(), b.to_string()))
        .collect();
    move |path: &str| -> Box<dyn Source> {
        match table.iter().find(|(p, _)| p == path) {
            Some((_, body)) => Box::new(MemorySource::from_text(body)),
            None => Box::new(FileSource::new(format!("/nonexistent/{}", path))),
        }
    }
}

fn concat_processor(calls: Arc<AtomicUsize>) -> impl CompoundProcessor<Output = String> {
    processor_fn(move |parts: &Parts| {
        calls.fetch_add(1, Ordering::SeqCst);
        let mut out = String::new();
        for path in parts.distinct_paths() {
            out.push_str(&parts.get_as::<String>(path)?);
        }
        Ok(out)
    })
}

#[test]
fn test_compound_resolves_in_any_part_order() {
    let orders: [[&str; 3]; 6] = [
        ["a", "b", "c"],
        ["a", "c", "b"],
        ["b", "a", "c"],
        ["b", "c", "a"],
        ["c", "a", "b"],
        ["c", "b", "a"],
    ];

    for order in orders {
        let manager = manager();
        // A cached last part arrives first, synchronously; the others follow in list order
        let cached = order[2];
        manager.request_asset(
            cached,
            TEXT,
            Box::new(MemorySource::from_text(&cached.to_uppercase())),
            Vec::new(),
        );
        manager.tick();

        let calls = Arc::new(AtomicUsize::new(0));
        let (listener, rx) = ChannelListener::new();
        let request = CompoundRequest::new("abc", JOINED, concat_processor(calls.clone()))
            .parts(order, TEXT)
            .source_factory(table_factory(&[("a", "A"), ("b", "B"), ("c", "C")]))
            .listener(listener);
        assert_eq!(
            manager.request_compound_asset(request).unwrap(),
            RequestStatus::Queued { position: 1 }
        );
        assert!(rx.try_recv().is_err());

        assert_eq!(manager.tick_until_idle(), 2);

        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(event.is_available(), "order {:?}", order);
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let expected: String = order.iter().map(|p| p.to_uppercase()).collect();
        assert_eq!(*manager.get_asset_as::<String>("abc").unwrap(), expected);
    }
}

#[test]
fn test_compound_with_duplicate_parts_processes_once() {
    let manager = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let (listener, rx) = ChannelListener::new();

    let request = CompoundRequest::new("aab", JOINED, concat_processor(calls.clone()))
        .parts(["a", "a", "b"], TEXT)
        .source_factory(table_factory(&[("a", "A"), ("b", "B")]))
        .listener(listener);
    assert_eq!(
        manager.request_compound_asset(request).unwrap(),
        RequestStatus::Queued { position: 2 }
    );

    assert_eq!(manager.tick_until_idle(), 3);

    assert_eq!(rx.try_iter().filter(|e| e.is_available()).count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*manager.get_asset_as::<String>("aab").unwrap(), "AB");
}

#[test]
fn test_compound_failure_refires_per_failed_part() {
    let manager = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let (listener, rx) = ChannelListener::new();

    let request = CompoundRequest::new("xyz", JOINED, concat_processor(calls.clone()))
        .parts(["x", "y", "z"], TEXT)
        .source_factory(table_factory(&[("y", "Y")]))
        .listener(listener);
    manager.request_compound_asset(request).unwrap();
    manager.tick_until_idle();

    let failed_parts: Vec<String> = rx
        .try_iter()
        .map(|event| match event {
            AssetEvent::NotAvailable {
                error: AssetError::PartFailed { part, .. },
                ..
            } => part,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();

    assert_eq!(failed_parts, vec!["x".to_string(), "z".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!manager.is_cached("xyz"));
    // The part that did load stays cached
    assert!(manager.is_cached("y"));
    assert_eq!(manager.stats().compounds_failed, 2);
}

#[test]
fn test_compound_processing_error() {
    let manager = manager();
    let (listener, rx) = ChannelListener::new();

    let request = CompoundRequest::new(
        "pair",
        JOINED,
        processor_fn(|parts: &Parts| -> Result<(), ProcessError> {
            let a = parts.get_as::<String>("a")?;
            let b = parts.get_as::<String>("b")?;
            if a.len() != b.len() {
                return Err(ProcessError::Invalid(format!("{} != {}", a.len(), b.len())));
            }
            Ok(())
        }),
    )
    .parts(["a", "b"], TEXT)
    .source_factory(table_factory(&[("a", "short"), ("b", "longer")]))
    .listener(listener);
    manager.request_compound_asset(request).unwrap();
    manager.tick_until_idle();

    match rx.try_recv().unwrap() {
        AssetEvent::NotAvailable { error, .. } => {
            assert!(matches!(error, AssetError::ProcessingFailed { .. }));
            assert_eq!(error.path(), Some("pair"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(rx.try_recv().is_err());
    assert!(!manager.is_cached("pair"));
}

#[test]
fn test_heterogeneous_parts() {
    const NUMBER: AssetType = AssetType::new("number");

    struct NumberLoader;

    impl AssetLoader for NumberLoader {
        type Asset = i64;

        fn load(&self, ctx: &mut LoadContext) -> LoadResult<i64> {
            let text = ctx.read_string()?;
            text.trim()
                .parse::<i64>()
                .map_err(|e| LoadError::Parse(format!("{}: {}", ctx.path(), e)))
        }
    }

    let mut registry = LoaderRegistry::new();
    registry.register(TEXT, TextLoader);
    registry.register(NUMBER, NumberLoader);
    let manager = AssetManager::init(AssetManagerConfig::default(), registry);

    let request = CompoundRequest::new(
        "repeat",
        JOINED,
        processor_fn(|parts: &Parts| {
            let word = parts.get_as::<String>("word")?;
            let count = parts.get_as::<i64>("count")?;
            Ok(word.repeat(*count as usize))
        }),
    )
    .typed_parts([("word", TEXT), ("count", NUMBER)])
    .source_factory(table_factory(&[("word", "ab"), ("count", " 3\n")]));
    manager.request_compound_asset(request).unwrap();
    manager.tick_until_idle();

    assert_eq!(*manager.get_asset_as::<String>("repeat").unwrap(), "ababab");
    assert_eq!(*manager.get_asset_as::<i64>("count").unwrap(), 3);
}

#[test]
fn test_source_closed_exactly_once() {
    let manager = manager();
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));

    for (path, loader_type) in [("ok.txt", TEXT), ("raw.bin", AssetType::new("opaque"))] {
        manager.request_asset(
            path,
            loader_type,
            Box::new(CountingSource {
                inner: MemorySource::from_text("body"),
                opened: opened.clone(),
                closed: closed.clone(),
            }),
            Vec::new(),
        );
    }
    manager.tick_until_idle();

    // The pass-through request never opens its source
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_can_enqueue_from_callback() {
    let manager = Arc::new(manager());
    let (follow_up, rx) = ChannelListener::new();

    let chain = {
        let manager = manager.clone();
        listener_fn(
            move |request| {
                manager.request_asset(
                    format!("{}.next", request.path()),
                    TEXT,
                    Box::new(MemorySource::from_text("next")),
                    [follow_up.clone()],
                );
            },
            |_, _| {},
        )
    };

    manager.request_asset("first", TEXT, Box::new(MemorySource::from_text("first")), [chain]);
    assert_eq!(manager.tick_until_idle(), 2);

    assert_eq!(rx.try_recv().unwrap().path(), "first.next");
    assert!(manager.is_cached("first.next"));
}

#[test]
fn test_background_dispatcher() {
    let manager = AssetManager::builder()
        .config(AssetManagerConfig {
            tick_interval_ms: 1,
            ..Default::default()
        })
        .register_loader(TEXT, TextLoader)
        .build();
    manager.start_dispatcher().unwrap();
    assert!(manager.is_dispatching());

    let (listener, rx) = ChannelListener::new();
    for i in 0..5 {
        manager.request_asset(
            format!("{}.txt", i),
            TEXT,
            Box::new(MemorySource::from_text(&i.to_string())),
            [listener.clone()],
        );
    }

    let mut seen = Vec::new();
    for _ in 0..5 {
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(event.is_available());
        seen.push(event.path().to_string());
    }
    assert_eq!(seen, vec!["0.txt", "1.txt", "2.txt", "3.txt", "4.txt"]);

    manager.stop_dispatcher();
    assert!(!manager.is_dispatching());
    assert_eq!(*manager.get_asset_as::<String>("4.txt").unwrap(), "4");
}

/// Loader with a bug
struct PanickingLoader;

impl AssetLoader for PanickingLoader {
    type Asset = ();

    fn load(&self, _ctx: &mut LoadContext) -> LoadResult<()> {
        panic!("loader bug")
    }
}

#[test]
fn test_panicking_loader_does_not_stop_dispatcher() {
    const BROKEN: AssetType = AssetType::new("broken");
    let manager = AssetManager::builder()
        .config(AssetManagerConfig {
            tick_interval_ms: 1,
            ..Default::default()
        })
        .register_loader(TEXT, TextLoader)
        .register_loader(BROKEN, PanickingLoader)
        .build();
    let (listener, rx) = ChannelListener::new();

    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    manager.request_asset(
        "bad.bin",
        BROKEN,
        Box::new(CountingSource {
            inner: MemorySource::from_text("x"),
            opened: opened.clone(),
            closed: closed.clone(),
        }),
        [listener.clone()],
    );
    manager.request_asset("ok.txt", TEXT, Box::new(MemorySource::from_text("fine")), [listener]);
    manager.start_dispatcher().unwrap();

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        AssetEvent::NotAvailable { path, error, .. } => {
            assert_eq!(path, "bad.bin");
            assert!(error.to_string().contains("loader bug"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(event.is_available());
    assert_eq!(event.path(), "ok.txt");

    assert!(manager.is_dispatching());
    manager.stop_dispatcher();
    assert!(!manager.is_cached("bad.bin"));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(manager.stats().failed, 1);
}

#[test]
fn test_panicking_listener_does_not_silence_others() {
    let manager = manager();
    let (listener, rx) = ChannelListener::new();
    let panicking = listener_fn(|_| panic!("listener bug"), |_, _| {});

    manager.request_asset(
        "a.txt",
        TEXT,
        Box::new(MemorySource::from_text("a")),
        [panicking, listener],
    );
    manager.request_asset("b.txt", TEXT, Box::new(MemorySource::from_text("b")), []);

    assert_eq!(manager.tick_until_idle(), 2);
    assert!(rx.try_recv().unwrap().is_available());
    assert!(manager.is_cached("a.txt"));
    assert!(manager.is_cached("b.txt"));
}

#[test]
fn test_concurrent_producers() {
    let manager = Arc::new(manager());
    let (listener, rx) = ChannelListener::new();
    manager.start_dispatcher().unwrap();

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let manager = manager.clone();
            let listener = listener.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    // Every producer asks for the same 10 paths
                    let path = format!("shared/{}.txt", i);
                    manager.request_asset(
                        path,
                        TEXT,
                        Box::new(MemorySource::from_text(&format!("{}", t))),
                        [listener.clone()],
                    );
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    for _ in 0..40 {
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(event.is_available());
    }
    manager.stop_dispatcher();

    let stats = manager.stats();
    assert_eq!(stats.requests, 40);
    assert_eq!(stats.cache_hits + stats.cache_misses, 40);
    assert_eq!(stats.loaded, 10);
    assert_eq!(stats.cached, 10);
}

#[test]
fn test_stop_dispatcher_from_listener() {
    let manager = Arc::new(
        AssetManager::builder()
            .config(AssetManagerConfig {
                tick_interval_ms: 1,
                ..Default::default()
            })
            .register_loader(TEXT, TextLoader)
            .build(),
    );
    let (done, rx) = ChannelListener::new();
    let stopper = {
        let manager = manager.clone();
        listener_fn(move |_| manager.stop_dispatcher(), |_, _| {})
    };

    manager.start_dispatcher().unwrap();
    manager.request_asset(
        "stop.txt",
        TEXT,
        Box::new(MemorySource::from_text("stop")),
        [stopper, done],
    );

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_available());
    assert!(!manager.is_dispatching());
}
