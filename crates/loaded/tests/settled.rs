//! The async `settled()` surface of a `LoadedSet`.

use core::time::Duration;

use dom::{Document, EngineQuirks, Size};
use loaded::{LoadOptions, LoadStatus, LoadedConfig, Loader, Settlement};

#[tokio::test]
async fn settled_collects_every_active_cycle_in_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let doc = Document::new(EngineQuirks::MODERN);
    let img = doc.append_element(doc.root(), "img").expect("img");
    let frame = doc.append_element(doc.root(), "iframe").expect("iframe");
    let div = doc.append_element(doc.root(), "div").expect("div");
    let loader = Loader::new(doc.clone());

    let set = loader.loaded(
        &[img, div, frame],
        LoadOptions::new().timeout(Duration::from_millis(30)),
    );
    let all = set.settled();

    doc.finish_load(img, Size::new(2, 2)).expect("load");
    doc.event_loop().advance(Duration::from_millis(30));

    assert_eq!(
        all.await,
        vec![
            Settlement {
                node: img,
                status: LoadStatus::Success
            },
            Settlement {
                node: frame,
                status: LoadStatus::Timeout
            },
        ]
    );
}

#[tokio::test]
async fn settled_after_completion_is_empty() {
    let doc = Document::new(EngineQuirks::LEGACY);
    let script = doc.append_element(doc.root(), "script").expect("script");
    let loader = Loader::with_config(doc.clone(), LoadedConfig::new(None, true));

    let set = loader.loaded(&[script], LoadOptions::new());
    doc.finish_load(script, Size::ZERO).expect("load");

    assert!(set.settled().await.is_empty());
    assert_eq!(loader.stats().successes, 1);
    assert_eq!(loader.stats().in_flight(), 0);
}
