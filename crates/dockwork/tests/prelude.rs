#![cfg(feature = "runtime")]

use dockwork::prelude::*;

struct Editor {
    key: PersistKey,
}

impl DockContent for Editor {
    fn persist_key(&self) -> &PersistKey {
        &self.key
    }

    fn title(&self) -> &str {
        "Editor"
    }

    fn view(&self) -> ViewHandle {
        ViewHandle(7)
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Document
    }
}

#[test]
fn prelude_covers_a_basic_session() {
    let mut manager = DockManager::new(|key: &PersistKey| -> Option<Box<dyn DockContent>> {
        Some(Box::new(Editor { key: key.clone() }))
    });
    let group = manager.tree().root().to_string();
    assert!(
        manager
            .dock("Doc:readme", &group, DockPosition::Center, None)
            .expect("docks")
    );
    assert_eq!(
        manager.active_content().map(PersistKey::as_str),
        Some("Doc:readme")
    );

    let json = manager.save_layout_json().expect("saves");
    let tree = layout::from_dto(
        &dockwork::LayoutDto::from_json(&json).expect("parses"),
        None,
    )
    .expect("supported version")
    .expect("has a root");
    assert_eq!(tree.all_keys(), manager.tree().all_keys());
}
