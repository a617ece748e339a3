use comicinfo::container::{ContainerError, ContainerHandler, ContainerRegistry};
use comicinfo::store::{AttachedStore, SidecarStore, StoreError};
use comicinfo::{
    ComicInfo, ContainerFormat, LoadingMethod, MetadataResolver, ResolverOptions, Source,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ── Instrumented backends ────────────────────────────────────────────────────

/// Tracks which sources are inside a backend call and how many calls
/// overlapped on the same source.
#[derive(Default)]
struct Overlap {
    active:       Mutex<HashMap<PathBuf, (usize, usize)>>, // (readers, writers)
    conflicts:    AtomicUsize,
    max_parallel: AtomicUsize,
    in_flight:    AtomicUsize,
}

impl Overlap {
    fn enter(&self, path: &Path, write: bool) {
        {
            let mut active = self.active.lock().unwrap();
            let slot = active.entry(path.to_owned()).or_default();
            if slot.1 > 0 || (write && slot.0 > 0) {
                self.conflicts.fetch_add(1, Ordering::SeqCst);
            }
            if write { slot.1 += 1 } else { slot.0 += 1 }
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_parallel.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
    }

    fn leave(&self, path: &Path, write: bool) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut active = self.active.lock().unwrap();
        let slot = active.get_mut(path).unwrap();
        if write { slot.1 -= 1 } else { slot.0 -= 1 }
    }
}

#[derive(Default)]
struct Stub {
    info:    Mutex<Option<ComicInfo>>,
    fail:    bool,
    loads:   AtomicUsize,
    stores:  AtomicUsize,
    overlap: Option<Arc<Overlap>>,
}

impl Stub {
    fn with(info: Option<ComicInfo>) -> Arc<Self> {
        Arc::new(Self { info: Mutex::new(info), ..Self::default() })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, ..Self::default() })
    }

    fn watched(overlap: &Arc<Overlap>, info: Option<ComicInfo>) -> Arc<Self> {
        Arc::new(Self { info: Mutex::new(info), overlap: Some(Arc::clone(overlap)), ..Self::default() })
    }

    fn load(&self, source: &Source) -> Option<ComicInfo> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(p) = &self.overlap { p.enter(source.path(), false); }
        let out = self.info.lock().unwrap().clone();
        if let Some(p) = &self.overlap { p.leave(source.path(), false); }
        out
    }

    fn store(&self, source: &Source, info: &ComicInfo) -> bool {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if let Some(p) = &self.overlap { p.enter(source.path(), true); }
        if !self.fail {
            *self.info.lock().unwrap() = Some(info.clone());
        }
        if let Some(p) = &self.overlap { p.leave(source.path(), true); }
        !self.fail
    }

    fn loads(&self) -> usize { self.loads.load(Ordering::SeqCst) }
    fn stores(&self) -> usize { self.stores.load(Ordering::SeqCst) }
}

fn io_failure() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "backend failure")
}

impl AttachedStore for Stub {
    fn load(&self, source: &Source) -> Result<Option<ComicInfo>, StoreError> {
        if self.fail { return Err(io_failure().into()); }
        Ok(Stub::load(self, source))
    }
    fn store(&self, source: &Source, info: &ComicInfo) -> Result<(), StoreError> {
        if Stub::store(self, source, info) { Ok(()) } else { Err(io_failure().into()) }
    }
}

impl SidecarStore for Stub {
    fn load(&self, source: &Source) -> Result<Option<ComicInfo>, StoreError> {
        if self.fail { return Err(io_failure().into()); }
        Ok(Stub::load(self, source))
    }
}

impl ContainerHandler for Stub {
    fn read_info(&self, source: &Source) -> Result<Option<ComicInfo>, ContainerError> {
        if self.fail { return Err(io_failure().into()); }
        Ok(Stub::load(self, source))
    }
    fn write_info(&self, source: &Source, info: &ComicInfo) -> Result<(), ContainerError> {
        if Stub::store(self, source, info) { Ok(()) } else { Err(io_failure().into()) }
    }
    fn entries(&self, _source: &Source) -> Result<Vec<String>, ContainerError> {
        if self.fail { return Err(io_failure().into()); }
        Ok(vec![
            "p01.jpg".into(),
            "__MACOSX/._p01.jpg".into(),
            "notes.txt".into(),
            "p02.WEBP".into(),
        ])
    }
}

/// Forwards to a shared stub so the test keeps a handle for assertions.
struct Shared(Arc<Stub>);

impl ContainerHandler for Shared {
    fn read_info(&self, s: &Source) -> Result<Option<ComicInfo>, ContainerError> { self.0.read_info(s) }
    fn write_info(&self, s: &Source, i: &ComicInfo) -> Result<(), ContainerError> { self.0.write_info(s, i) }
    fn entries(&self, s: &Source) -> Result<Vec<String>, ContainerError> { self.0.entries(s) }
}

struct Fixture {
    attached:  Arc<Stub>,
    sidecar:   Arc<Stub>,
    container: Arc<Stub>,
}

impl Fixture {
    fn new(attached: Arc<Stub>, sidecar: Arc<Stub>, container: Arc<Stub>) -> Self {
        Self { attached, sidecar, container }
    }

    fn resolver(&self, options: ResolverOptions) -> MetadataResolver {
        let registry = ContainerRegistry::new()
            .with(ContainerFormat::Cbx, Shared(Arc::clone(&self.container)));
        MetadataResolver::with_backends(
            options,
            self.attached.clone(),
            self.sidecar.clone(),
            registry,
        )
    }
}

fn cbx() -> Source {
    Source::new("library/book.cbx", ContainerFormat::Cbx)
}

fn titled(t: &str) -> Option<ComicInfo> {
    Some(ComicInfo::titled(t))
}

// ── Load ─────────────────────────────────────────────────────────────────────

#[test]
fn fast_load_returns_attached_without_touching_container() {
    let fx = Fixture::new(Stub::with(titled("attached")), Stub::with(titled("sidecar")), Stub::with(titled("embedded")));
    let got = fx.resolver(ResolverOptions::default()).load_info(&cbx(), LoadingMethod::Fast).unwrap();
    assert_eq!(got, titled("attached"));
    assert_eq!(fx.sidecar.loads(), 0);
    assert_eq!(fx.container.loads(), 0);
}

#[test]
fn fast_load_uses_sidecar_when_attached_is_empty() {
    let fx = Fixture::new(Stub::with(None), Stub::with(titled("sidecar")), Stub::with(titled("embedded")));
    let got = fx.resolver(ResolverOptions::default()).load_info(&cbx(), LoadingMethod::Fast).unwrap();
    assert_eq!(got, titled("sidecar"));
    assert_eq!(fx.container.loads(), 0);
}

#[test]
fn fast_load_falls_through_to_container() {
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::with(titled("embedded")));
    let got = fx.resolver(ResolverOptions::default()).load_info(&cbx(), LoadingMethod::Fast).unwrap();
    assert_eq!(got, titled("embedded"));
    assert_eq!(fx.container.loads(), 1);
}

#[test]
fn full_load_prefers_embedded_record() {
    let fx = Fixture::new(Stub::with(titled("attached")), Stub::with(titled("sidecar")), Stub::with(titled("embedded")));
    let got = fx.resolver(ResolverOptions::default()).load_info(&cbx(), LoadingMethod::Full).unwrap();
    assert_eq!(got, titled("embedded"));
}

#[test]
fn full_load_keeps_fallback_when_container_is_empty() {
    let fx = Fixture::new(Stub::with(None), Stub::with(titled("sidecar")), Stub::with(None));
    let got = fx.resolver(ResolverOptions::default()).load_info(&cbx(), LoadingMethod::Full).unwrap();
    assert_eq!(got, titled("sidecar"));
    assert_eq!(fx.container.loads(), 1);
}

#[test]
fn disabled_backends_are_skipped() {
    let fx = Fixture::new(Stub::with(titled("attached")), Stub::with(titled("sidecar")), Stub::with(None));
    let options = ResolverOptions { disable_attached: true, disable_sidecar: true, ..Default::default() };
    let got = fx.resolver(options).load_info(&cbx(), LoadingMethod::Fast).unwrap();
    assert_eq!(got, None);
    assert_eq!(fx.attached.loads(), 0);
    assert_eq!(fx.sidecar.loads(), 0);
    assert_eq!(fx.container.loads(), 1);
}

#[test]
fn disabled_attached_still_consults_sidecar() {
    let fx = Fixture::new(Stub::with(titled("attached")), Stub::with(titled("sidecar")), Stub::with(None));
    let options = ResolverOptions { disable_attached: true, ..Default::default() };
    let got = fx.resolver(options).load_info(&cbx(), LoadingMethod::Fast).unwrap();
    assert_eq!(got, titled("sidecar"));
}

#[test]
fn failing_backends_count_as_absent() {
    let fx = Fixture::new(Stub::failing(), Stub::failing(), Stub::with(titled("embedded")));
    let resolver = fx.resolver(ResolverOptions::default());
    assert_eq!(resolver.load_info(&cbx(), LoadingMethod::Fast).unwrap(), titled("embedded"));

    let fx = Fixture::new(Stub::with(None), Stub::with(titled("sidecar")), Stub::failing());
    let resolver = fx.resolver(ResolverOptions::default());
    assert_eq!(resolver.load_info(&cbx(), LoadingMethod::Full).unwrap(), titled("sidecar"));
}

#[test]
fn unregistered_format_loads_fallback_only() {
    let fx = Fixture::new(Stub::with(None), Stub::with(titled("sidecar")), Stub::with(titled("embedded")));
    let folder = Source::new("library/loose", ContainerFormat::Folder);
    let got = fx.resolver(ResolverOptions::default()).load_info(&folder, LoadingMethod::Full).unwrap();
    assert_eq!(got, titled("sidecar"));
    assert_eq!(fx.container.loads(), 0);
}

// ── Store ────────────────────────────────────────────────────────────────────

#[test]
fn store_writes_container_then_attached() {
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::with(None));
    let info = ComicInfo::titled("new");
    assert!(fx.resolver(ResolverOptions::default()).store_info(&cbx(), &info).unwrap());
    assert_eq!(fx.container.stores(), 1);
    assert_eq!(fx.attached.stores(), 1);
    assert_eq!(*fx.container.info.lock().unwrap(), Some(info.clone()));
    assert_eq!(*fx.attached.info.lock().unwrap(), Some(info));
}

#[test]
fn failed_container_write_aborts_store() {
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::failing());
    let stored = fx.resolver(ResolverOptions::default()).store_info(&cbx(), &ComicInfo::titled("x")).unwrap();
    assert!(!stored);
    assert_eq!(fx.container.stores(), 1);
    assert_eq!(fx.attached.stores(), 0);
}

#[test]
fn failed_attached_write_does_not_undo_container_success() {
    let fx = Fixture::new(Stub::failing(), Stub::with(None), Stub::with(None));
    let stored = fx.resolver(ResolverOptions::default()).store_info(&cbx(), &ComicInfo::titled("x")).unwrap();
    assert!(stored);
    assert_eq!(fx.attached.stores(), 1);
}

#[test]
fn update_disabled_format_stores_attached_only() {
    // `.zip` does not match the CBX descriptor, so updates are disabled.
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::with(None));
    let source = Source::new("library/book.zip", ContainerFormat::Cbx);
    let resolver = fx.resolver(ResolverOptions::default());
    assert!(!resolver.update_enabled(&source));
    assert!(resolver.store_info(&source, &ComicInfo::titled("x")).unwrap());
    assert_eq!(fx.container.stores(), 0);
    assert_eq!(fx.attached.stores(), 1);
}

#[test]
fn store_with_nothing_writable_fails() {
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::with(None));
    let source = Source::new("library/book.zip", ContainerFormat::Cbx);
    let options = ResolverOptions { disable_attached: true, ..Default::default() };
    assert!(!fx.resolver(options).store_info(&source, &ComicInfo::titled("x")).unwrap());

    let fx = Fixture::new(Stub::failing(), Stub::with(None), Stub::with(None));
    assert!(!fx.resolver(ResolverOptions::default()).store_info(&source, &ComicInfo::titled("x")).unwrap());
}

#[test]
fn missing_handler_counts_as_failed_container_write() {
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::with(None));
    let resolver = MetadataResolver::with_backends(
        ResolverOptions::default(),
        fx.attached.clone(),
        fx.sidecar.clone(),
        ContainerRegistry::new(),
    );
    assert!(!resolver.store_info(&cbx(), &ComicInfo::titled("x")).unwrap());
    assert_eq!(fx.attached.stores(), 0);
}

// ── Pages ────────────────────────────────────────────────────────────────────

#[test]
fn images_filters_junk_and_non_images() {
    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::with(None));
    let pages = fx.resolver(ResolverOptions::default()).images(&cbx()).unwrap();
    assert_eq!(pages, vec!["p01.jpg", "p02.WEBP"]);

    let fx = Fixture::new(Stub::with(None), Stub::with(None), Stub::failing());
    assert!(fx.resolver(ResolverOptions::default()).images(&cbx()).unwrap().is_empty());
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[test]
fn loads_and_stores_on_one_source_never_interleave() {
    let overlap = Arc::new(Overlap::default());
    let fx = Fixture::new(
        Stub::watched(&overlap, titled("attached")),
        Stub::watched(&overlap, None),
        Stub::watched(&overlap, titled("embedded")),
    );
    let resolver = Arc::new(fx.resolver(ResolverOptions::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || {
                for n in 0..10 {
                    if i % 2 == 0 {
                        resolver.store_info(&cbx(), &ComicInfo::titled(format!("w{i}-{n}"))).unwrap();
                    } else {
                        resolver.load_info(&cbx(), LoadingMethod::Full).unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles { h.join().unwrap(); }

    assert_eq!(overlap.conflicts.load(Ordering::SeqCst), 0);
}

#[test]
fn loads_on_different_sources_overlap() {
    let overlap = Arc::new(Overlap::default());
    let fx = Fixture::new(Stub::watched(&overlap, titled("attached")), Stub::with(None), Stub::with(None));
    let resolver = Arc::new(fx.resolver(ResolverOptions::default()));
    let barrier = Arc::new(std::sync::Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let resolver = Arc::clone(&resolver);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let source = Source::new(format!("library/{i}.cbx"), ContainerFormat::Cbx);
                barrier.wait();
                for _ in 0..20 {
                    resolver.load_info(&source, LoadingMethod::Fast).unwrap();
                }
            })
        })
        .collect();
    for h in handles { h.join().unwrap(); }

    assert_eq!(overlap.conflicts.load(Ordering::SeqCst), 0);
    assert!(overlap.max_parallel.load(Ordering::SeqCst) > 1);
}

#[test]
fn lock_timeout_surfaces_as_error() {
    struct Slow;
    impl ContainerHandler for Slow {
        fn read_info(&self, _: &Source) -> Result<Option<ComicInfo>, ContainerError> {
            thread::sleep(Duration::from_millis(300));
            Ok(None)
        }
        fn write_info(&self, _: &Source, _: &ComicInfo) -> Result<(), ContainerError> { Ok(()) }
        fn entries(&self, _: &Source) -> Result<Vec<String>, ContainerError> { Ok(Vec::new()) }
    }

    let resolver = Arc::new(MetadataResolver::with_backends(
        ResolverOptions { lock_timeout: Some(Duration::from_millis(20)), ..Default::default() },
        Stub::with(None),
        Stub::with(None),
        ContainerRegistry::new().with(ContainerFormat::Cbx, Slow),
    ));

    let reader = {
        let resolver = Arc::clone(&resolver);
        thread::spawn(move || resolver.load_info(&cbx(), LoadingMethod::Full).unwrap())
    };
    thread::sleep(Duration::from_millis(50));
    let err = resolver.store_info(&cbx(), &ComicInfo::titled("x")).unwrap_err();
    assert!(matches!(err, comicinfo::LockError::Timeout { .. }));
    reader.join().unwrap();
}
