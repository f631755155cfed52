//! Atom setters reached from inside handlers.

use std::future::ready;
use std::sync::{Arc, Mutex};

use context_action::{define_action, ActionRegister, HandlerConfig, PipelineController, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    Light,
    Dark,
}

define_action!(SetTheme => "ui/set-theme", Theme);

#[tokio::test]
async fn handler_writes_external_cell_by_key() {
    let pipeline = ActionRegister::new();
    let cell = Arc::new(Mutex::new(Theme::Light));

    let target = cell.clone();
    pipeline.register_atom_setter("theme", move |theme: Theme| {
        *target.lock().unwrap() = theme;
    });

    let setters = pipeline.downgrade();
    pipeline.register::<SetTheme, _>(
        move |theme: Theme, _: PipelineController<Theme>| ready(setters.set_atom("theme", theme).map_err(Into::into)),
        HandlerConfig::new().blocking(true),
    );

    pipeline.dispatch::<SetTheme>(Theme::Dark).await.unwrap();

    assert_eq!(*cell.lock().unwrap(), Theme::Dark);
    assert!(pipeline.has_atom_setter("theme"));
    assert_eq!(pipeline.atom_setter_keys(), vec!["theme"]);
}

#[tokio::test]
async fn missing_setter_fails_a_blocking_handler() {
    let pipeline = ActionRegister::new();

    let setters = pipeline.downgrade();
    pipeline.register::<SetTheme, _>(
        move |theme: Theme, _| ready(setters.set_atom("theme", theme).map_err(Into::into)),
        HandlerConfig::new().id("theme-writer").blocking(true),
    );

    let err = pipeline.dispatch::<SetTheme>(Theme::Dark).await.unwrap_err();

    let PipelineError::Handler { handler_id, source, .. } = err else {
        panic!("expected handler error");
    };
    assert_eq!(handler_id, "theme-writer");
    assert!(matches!(
        source.downcast_ref::<PipelineError>(),
        Some(PipelineError::UnknownAtomSetter { .. })
    ));
}

#[tokio::test]
async fn setters_survive_clearing_handlers() {
    let pipeline = ActionRegister::new();
    let hits = Arc::new(Mutex::new(0));

    let h = hits.clone();
    pipeline.register_atom_setter("counter", move |n: i32| *h.lock().unwrap() += n);
    pipeline.clear_all();

    pipeline.set_atom("counter", 3).unwrap();
    pipeline.set_atom("counter", 4).unwrap();

    assert_eq!(*hits.lock().unwrap(), 7);
}

#[tokio::test]
async fn weak_handle_reports_a_dropped_registry() {
    let pipeline = ActionRegister::new();
    let cell = Arc::new(Mutex::new(Theme::Light));

    let target = cell.clone();
    pipeline.register_atom_setter("theme", move |theme: Theme| {
        *target.lock().unwrap() = theme;
    });
    let setters = pipeline.downgrade();

    setters.set_atom("theme", Theme::Dark).unwrap();
    assert_eq!(*cell.lock().unwrap(), Theme::Dark);

    drop(pipeline);

    assert!(matches!(
        setters.set_atom("theme", Theme::Light),
        Err(PipelineError::RegistryDropped)
    ));
    assert_eq!(*cell.lock().unwrap(), Theme::Dark);
}
