use serde_json::{Value, json};

use form_spec::{AnswerStore, ID_LENGTH, StoreError};

/// Skeleton with one repeatable group ("contacts") holding a nested
/// repeatable group ("phones") and a scalar list ("tags").
fn skeleton() -> Value {
    json!({
        "name": "",
        "contacts": [
            {
                "contact_name": "",
                "tags": ["friend"],
                "phones": [ { "number": "" } ]
            }
        ],
        "colors": ["red"]
    })
}

fn store() -> AnswerStore {
    AnswerStore::new(skeleton())
}

/// The clone's keys for (contact_name, tags, phones, number), in that order.
fn clone_ids(store: &AnswerStore) -> (String, String, String, String) {
    let instances = store.get("contacts").expect("contacts").as_array().expect("array");
    let element = instances.last().expect("clone").as_object().expect("object");
    let mut contact_name = None;
    let mut tags = None;
    let mut phones = None;
    let mut number = None;
    for (key, value) in element {
        match store.convert_id(key).as_str() {
            "contact_name" => contact_name = Some(key.clone()),
            "tags" => tags = Some(key.clone()),
            "phones" => {
                phones = Some(key.clone());
                let first = value.as_array().expect("phones").first().expect("element");
                for inner in first.as_object().expect("object").keys() {
                    if store.convert_id(inner) == "number" {
                        number = Some(inner.clone());
                    }
                }
            }
            other => panic!("unexpected canonical id {other}"),
        }
    }
    (
        contact_name.expect("contact_name"),
        tags.expect("tags"),
        phones.expect("phones"),
        number.expect("number"),
    )
}

#[test]
fn get_returns_scalars_and_whole_groups() {
    let store = store();
    assert_eq!(store.get("name"), Some(&json!("")));
    assert_eq!(store.get("contact_name"), Some(&json!("")));
    assert_eq!(store.get("colors"), Some(&json!(["red"])));
    let contacts = store.get("contacts").expect("contacts");
    assert!(contacts.is_array());
    assert_eq!(contacts.as_array().expect("array").len(), 1);
    assert_eq!(store.get("missing"), None);
}

#[test]
fn get_parent_skips_the_element_index() {
    let store = store();
    // parent of a key nested in an element is never the bare index position
    let parent = store.get_parent("contact_name").expect("parent");
    assert!(parent.is_array());
    // parent of a top-level key is the document itself
    let root = store.get_parent("name").expect("root");
    assert!(root.get("contacts").is_some());
}

#[test]
fn update_overwrites_in_place() {
    let mut store = store();
    store.update("name", json!("Ada")).expect("update");
    store
        .update("number", json!("555-0100"))
        .expect("nested update");
    assert_eq!(store.get("name"), Some(&json!("Ada")));
    assert_eq!(
        store.document()["contacts"][0]["phones"][0]["number"],
        json!("555-0100")
    );
}

#[test]
fn update_unknown_id_is_an_error() {
    let mut store = store();
    let error = store.update("missing", json!(1)).expect_err("unknown id");
    assert!(matches!(error, StoreError::UnknownId(_)));
}

#[test]
fn update_array_resyncs_the_path_index() {
    let mut store = store();
    let mut instances = store
        .get("contacts")
        .expect("contacts")
        .as_array()
        .expect("array")
        .clone();
    instances.push(json!({ "manual01": "x" }));
    store
        .update_array("contacts", Value::Array(instances))
        .expect("commit");
    // the new element's key is addressable immediately
    assert_eq!(store.get("manual01"), Some(&json!("x")));
    store.update("manual01", json!("y")).expect("update new key");
    assert_eq!(store.document()["contacts"][1]["manual01"], json!("y"));
}

#[test]
fn declare_new_array_item_clones_the_template_with_fresh_ids() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");

    let instances = store
        .get("contacts")
        .expect("contacts")
        .as_array()
        .expect("array");
    assert_eq!(instances.len(), 2);

    let (contact_name, tags, phones, number) = clone_ids(&store);
    for id in [&contact_name, &tags, &phones, &number] {
        assert_eq!(id.len(), ID_LENGTH);
        assert!(store.contains(id), "clone id {id} must be indexed");
    }

    // structurally isomorphic to the template: same nesting, same lengths
    assert_eq!(store.get(&contact_name), Some(&json!("")));
    assert_eq!(store.get(&tags), Some(&json!(["friend"])));
    assert_eq!(
        store.get(&phones).expect("phones").as_array().expect("array").len(),
        1
    );
    assert_eq!(store.get(&number), Some(&json!("")));

    // alias table points every fresh id at its canonical template id
    assert_eq!(store.convert_id(&contact_name), "contact_name");
    assert_eq!(store.convert_id(&phones), "phones");
    assert_eq!(store.convert_id(&number), "number");
    assert_eq!(store.convert_id("name"), "name");
}

#[test]
fn clone_ids_never_collide_within_a_pass() {
    let mut store = store();
    for _ in 0..10 {
        store.declare_new_array_item("contacts").expect("declare");
    }
    let mut seen = std::collections::HashSet::new();
    for id in store.all_ids() {
        assert!(seen.insert(id.clone()), "duplicate id {id}");
    }
}

#[test]
fn declare_through_an_alias_targets_that_instance() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");
    let (_, _, phones, _) = clone_ids(&store);

    // grow the second contact's phone list through its aliased group id
    store.declare_new_array_item(&phones).expect("nested declare");

    let document = store.document();
    assert_eq!(
        document["contacts"][0]["phones"].as_array().expect("first").len(),
        1
    );
    assert_eq!(
        document["contacts"][1][&phones].as_array().expect("second").len(),
        2
    );
}

#[test]
fn declare_on_a_non_group_id_is_an_error() {
    let mut store = store();
    let error = store.declare_new_array_item("name").expect_err("not a group");
    assert!(matches!(error, StoreError::NotAnArray(_)));
}

#[test]
fn delete_array_item_removes_one_instance() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");
    store.delete_array_item("contacts", 0).expect("delete");

    let instances = store
        .get("contacts")
        .expect("contacts")
        .as_array()
        .expect("array");
    assert_eq!(instances.len(), 1);
    // the surviving element is the clone; its canonical ids left the index
    assert!(!store.contains("contact_name"));

    // out-of-range removal leaves the list untouched
    store.delete_array_item("contacts", 5).expect("no-op delete");
    assert_eq!(
        store.get("contacts").expect("contacts").as_array().expect("array").len(),
        1
    );
}

#[test]
fn conversion_table_can_be_scoped_to_a_subtree() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");

    let full = store.conversion_table(None);
    assert_eq!(full.len(), 4);
    assert!(full.values().any(|canonical| canonical == "contact_name"));

    let second = store.document()["contacts"][1].clone();
    let scoped = store.conversion_table(Some(&second));
    assert_eq!(scoped.len(), 4);
    for (id, canonical) in &scoped {
        assert_ne!(id, canonical, "scoped table only sees aliased ids here");
    }

    let first = store.document()["contacts"][0].clone();
    let identity = store.conversion_table(Some(&first));
    assert_eq!(identity.get("contact_name"), Some(&"contact_name".to_string()));
}

#[test]
fn relevant_version_prefers_the_enclosing_instance() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");
    let (contact_name, _, _, number) = clone_ids(&store);

    // from inside element two, the template reference lands on its own clone
    assert_eq!(
        store.relevant_version_of("contact_name", &number),
        contact_name
    );
    assert_eq!(
        store.relevant_version_of("contact_name", &contact_name),
        contact_name
    );
    // from inside element one, the canonical ids win
    assert_eq!(
        store.relevant_version_of("contact_name", "number"),
        "contact_name"
    );
}

#[test]
fn relevant_version_searches_downstream_from_a_group_context() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");
    let (_, _, _, number) = clone_ids(&store);

    // context is the array itself: the newest instance is searched first
    assert_eq!(store.relevant_version_of("number", "contacts"), number);
}

#[test]
fn relevant_version_falls_back_to_the_target() {
    let mut store = store();
    store.declare_new_array_item("contacts").expect("declare");
    let (contact_name, _, _, _) = clone_ids(&store);

    // a genuinely global reference resolves to itself
    assert_eq!(store.relevant_version_of("name", &contact_name), "name");
    // unknown context leaves the target untouched
    assert_eq!(store.relevant_version_of("name", "missing"), "name");
    // sibling scan of the document root
    assert_eq!(store.relevant_version_of("contacts", "name"), "contacts");
}

#[test]
fn resume_restores_a_saved_session() {
    let mut live = store();
    live.declare_new_array_item("contacts").expect("declare");
    live.update("name", json!("Ada")).expect("update");

    let saved_answers = live.document().clone();
    let saved_aliases = live.aliases().clone();
    let resumed = AnswerStore::resume(&skeleton(), saved_answers, saved_aliases);

    assert_eq!(resumed.document(), live.document());
    assert_eq!(resumed.aliases(), live.aliases());
    assert_eq!(resumed.all_ids().len(), live.all_ids().len());

    // templates come from the pristine skeleton, so replication still works
    let mut resumed = resumed;
    resumed.declare_new_array_item("contacts").expect("declare");
    assert_eq!(
        resumed.get("contacts").expect("contacts").as_array().expect("array").len(),
        3
    );
}
