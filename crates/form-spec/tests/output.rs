use serde_json::{Value, json};

use form_spec::{
    AnswerError, ChoiceType, FormOutput, FormTree, ItemDetailsPatch, ItemKind, Placement,
    QuestionType, RenderCondition,
};

fn fixture() -> &'static str {
    include_str!("fixtures/survey_form.json")
}

/// Root -> page -> card with one multiple-choice question over A/B/C.
fn choice_form(choice_type: ChoiceType, min_selected: usize, max_selected: usize) -> (FormTree, String) {
    let mut tree = FormTree::new();
    let root = tree.root_id().to_string();
    let page = tree.insert_form(&root, Placement::Append).expect("page");
    let card = tree.insert_form(&page, Placement::Append).expect("card");
    let question = tree
        .insert_item(&card, ItemKind::Question, Placement::Append)
        .expect("question");
    tree.convert_question_type(&question, QuestionType::MultipleChoice);
    tree.update_item_details(
        &question,
        &ItemDetailsPatch {
            choice_type: Some(choice_type),
            min_selected: Some(min_selected),
            max_selected: Some(max_selected),
            choices: Some(vec!["A".to_string(), "B".to_string(), "C".to_string()]),
            ..Default::default()
        },
    );
    (tree, question)
}

fn selection(output: &FormOutput, id: &str) -> Vec<String> {
    output
        .store()
        .get(id)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn choice_select_fills_an_empty_selection() {
    let (tree, q) = choice_form(ChoiceType::Standard, 0, 1);
    let mut output = FormOutput::new(&tree);
    assert!(selection(&output, &q).is_empty());
    output.answer_multiple_choice(&q, Some("B")).expect("select");
    assert_eq!(selection(&output, &q), vec!["B"]);
}

#[test]
fn choice_reselect_under_a_full_single_slot_is_stable() {
    let (tree, q) = choice_form(ChoiceType::Standard, 1, 1);
    let mut output = FormOutput::new(&tree);
    // one selection is mandatory, so the skeleton pre-selects the first choice
    assert_eq!(selection(&output, &q), vec!["A"]);
    output.answer_multiple_choice(&q, Some("B")).expect("select");
    assert_eq!(selection(&output, &q), vec!["B"]);
    output.answer_multiple_choice(&q, Some("B")).expect("reselect");
    assert_eq!(selection(&output, &q), vec!["B"]);
}

#[test]
fn choice_at_capacity_evicts_the_oldest_selection() {
    let (tree, q) = choice_form(ChoiceType::Standard, 0, 2);
    let mut output = FormOutput::new(&tree);
    output.answer_multiple_choice(&q, Some("A")).expect("select A");
    output.answer_multiple_choice(&q, Some("B")).expect("select B");
    output.answer_multiple_choice(&q, Some("C")).expect("select C");
    assert_eq!(selection(&output, &q), vec!["B", "C"]);
}

#[test]
fn dropdown_always_holds_exactly_the_latest_pick() {
    let (tree, q) = choice_form(ChoiceType::Dropdown, 1, 1);
    let mut output = FormOutput::new(&tree);
    assert_eq!(selection(&output, &q), vec!["A"]);
    output.answer_multiple_choice(&q, Some("B")).expect("pick");
    assert_eq!(selection(&output, &q), vec!["B"]);
}

#[test]
fn choice_none_clears_when_nothing_is_mandatory() {
    let (tree, q) = choice_form(ChoiceType::Standard, 0, 1);
    let mut output = FormOutput::new(&tree);
    output.answer_multiple_choice(&q, Some("A")).expect("select");
    output.answer_multiple_choice(&q, None).expect("clear");
    assert!(selection(&output, &q).is_empty());
}

#[test]
fn choice_none_is_ignored_when_a_selection_is_mandatory() {
    let (tree, q) = choice_form(ChoiceType::Standard, 1, 1);
    let mut output = FormOutput::new(&tree);
    output.answer_multiple_choice(&q, None).expect("ignored");
    assert_eq!(selection(&output, &q), vec!["A"]);
}

#[test]
fn choice_click_on_selected_entry_deselects_it() {
    let (tree, q) = choice_form(ChoiceType::Standard, 0, 2);
    let mut output = FormOutput::new(&tree);
    output.answer_multiple_choice(&q, Some("A")).expect("select A");
    output.answer_multiple_choice(&q, Some("B")).expect("select B");
    output.answer_multiple_choice(&q, Some("A")).expect("deselect A");
    assert_eq!(selection(&output, &q), vec!["B"]);
}

#[test]
fn choice_deselect_never_breaches_the_minimum() {
    let (tree, q) = choice_form(ChoiceType::Standard, 1, 1);
    let mut output = FormOutput::new(&tree);
    output.answer_multiple_choice(&q, Some("A")).expect("click");
    assert_eq!(selection(&output, &q), vec!["A"]);
}

#[test]
fn answering_an_input_question_as_multiple_choice_is_an_error() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    let error = output
        .answer_multiple_choice("qName", Some("A"))
        .expect_err("input question");
    assert!(matches!(error, AnswerError::NotMultipleChoice(_)));
}

#[test]
fn input_answers_land_in_the_document() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    output
        .answer_input_question("qName", json!("Ada"))
        .expect("answer");
    output
        .answer_input_question("qAge", json!(41))
        .expect("answer");
    let exported = output.export_value(false);
    assert_eq!(exported["about_you"]["bio"]["name"], json!("Ada"));
    assert_eq!(exported["about_you"]["bio"]["age"], json!(41));
}

#[test]
fn export_renames_every_id_to_its_output_key() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let output = FormOutput::new(&tree);
    let exported = output.export_value(false);
    assert_eq!(
        exported,
        json!({
            "about_you": {
                "bio": {
                    "name": "",
                    "age": 30,
                    "favorite_colors": ["red"],
                    "pets": [
                        {
                            "pet_name": "",
                            "pet_type": ["dog"],
                            "walk_schedule": ""
                        }
                    ]
                }
            },
            "wrap_up": {
                "wrap": {
                    "feedback": ""
                }
            }
        })
    );
}

#[test]
fn filtered_export_drops_hidden_subtrees() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    // cats do not need walking, so the gated note disappears
    output
        .answer_multiple_choice("qPetType", Some("cat"))
        .expect("pick");
    let filtered = output.export_value(true);
    let pet = &filtered["about_you"]["bio"]["pets"][0];
    assert_eq!(pet["pet_type"], json!(["cat"]));
    assert!(pet.get("walk_schedule").is_none());
    // the unfiltered export still carries the hidden answer
    let unfiltered = output.export_value(false);
    assert!(unfiltered["about_you"]["bio"]["pets"][0].get("walk_schedule").is_some());
}

#[test]
fn visibility_follows_the_dependency_answer() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    let table = output.render_table();
    // default pet type is dog, so the walk schedule renders
    assert_eq!(table.get("qPetNote"), Some(&true));
    assert_eq!(table.get("qPetName"), Some(&true));

    output
        .answer_multiple_choice("qPetType", Some("cat"))
        .expect("pick");
    let table = output.render_table();
    assert_eq!(table.get("qPetNote"), Some(&false));
}

#[test]
fn visibility_inherits_a_hidden_dependency() {
    // chain: gate -> middle -> leaf; hiding the gate's target hides the leaf
    let mut tree = FormTree::new();
    let root = tree.root_id().to_string();
    let page = tree.insert_form(&root, Placement::Append).expect("page");
    let card = tree.insert_form(&page, Placement::Append).expect("card");

    let mut add_choice = |tree: &mut FormTree, card: &str| {
        let id = tree
            .insert_item(card, ItemKind::Question, Placement::Append)
            .expect("question");
        tree.convert_question_type(&id, QuestionType::MultipleChoice);
        tree.update_item_details(
            &id,
            &ItemDetailsPatch {
                min_selected: Some(1),
                max_selected: Some(1),
                choices: Some(vec!["yes".to_string(), "no".to_string()]),
                ..Default::default()
            },
        );
        id
    };
    let gate = add_choice(&mut tree, &card);
    let middle = add_choice(&mut tree, &card);
    let leaf = add_choice(&mut tree, &card);
    tree.update_item_details(
        &middle,
        &ItemDetailsPatch {
            render_conditionally: Some(true),
            render_condition: Some(RenderCondition {
                question_id: Some(gate.clone()),
                question_value: Some("yes".to_string()),
            }),
            ..Default::default()
        },
    );
    tree.update_item_details(
        &leaf,
        &ItemDetailsPatch {
            render_conditionally: Some(true),
            render_condition: Some(RenderCondition {
                question_id: Some(middle.clone()),
                question_value: Some("yes".to_string()),
            }),
            ..Default::default()
        },
    );

    let mut output = FormOutput::new(&tree);
    // defaults: everything answers "yes", everything renders
    let table = output.render_table();
    assert_eq!(table.get(&middle), Some(&true));
    assert_eq!(table.get(&leaf), Some(&true));

    // the leaf's own dependency still answers "yes", but its dependency is
    // hidden now, and hiddenness wins
    output.answer_multiple_choice(&gate, Some("no")).expect("gate no");
    let table = output.render_table();
    assert_eq!(table.get(&middle), Some(&false));
    assert_eq!(table.get(&leaf), Some(&false));
}

#[test]
fn dependency_cycles_terminate_and_default_to_visible() {
    let mut tree = FormTree::new();
    let root = tree.root_id().to_string();
    let page = tree.insert_form(&root, Placement::Append).expect("page");
    let card = tree.insert_form(&page, Placement::Append).expect("card");
    let mut gated_choice = |tree: &mut FormTree| {
        let id = tree
            .insert_item(&card, ItemKind::Question, Placement::Append)
            .expect("question");
        tree.convert_question_type(&id, QuestionType::MultipleChoice);
        tree.update_item_details(
            &id,
            &ItemDetailsPatch {
                min_selected: Some(1),
                max_selected: Some(1),
                choices: Some(vec!["yes".to_string(), "no".to_string()]),
                ..Default::default()
            },
        );
        id
    };
    let a = gated_choice(&mut tree);
    let b = gated_choice(&mut tree);
    for (id, dep) in [(&a, &b), (&b, &a)] {
        tree.update_item_details(
            id,
            &ItemDetailsPatch {
                render_conditionally: Some(true),
                render_condition: Some(RenderCondition {
                    question_id: Some(dep.to_string()),
                    question_value: Some("yes".to_string()),
                }),
                ..Default::default()
            },
        );
    }

    let output = FormOutput::new(&tree);
    let table = output.render_table();
    // every id got a verdict and the cycle fell back to visible
    for id in output.store().all_ids() {
        assert!(table.contains_key(id), "no verdict for {id}");
    }
    assert_eq!(table.get(&a), Some(&true));
    assert_eq!(table.get(&b), Some(&true));
}

#[test]
fn replicated_instances_resolve_their_own_dependencies() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    output.declare_new_array_item("grpPets").expect("declare");

    let second = output.store().document()["pageOne"]["cardBio"]["grpPets"][1].clone();
    let scoped = output.store().conversion_table(Some(&second));
    let alias_of = |canonical: &str| {
        scoped
            .iter()
            .find(|(_, mapped)| mapped.as_str() == canonical)
            .map(|(alias, _)| alias.clone())
            .expect("alias")
    };
    let type_alias = alias_of("qPetType");
    let note_alias = alias_of("qPetNote");

    // the second pet is a cat; the first keeps the default dog
    output
        .answer_multiple_choice(&type_alias, Some("cat"))
        .expect("pick");

    let table = output.render_table();
    assert_eq!(table.get("qPetNote"), Some(&true));
    assert_eq!(table.get(&note_alias), Some(&false));

    // instance-scoped resolution from inside element two lands on its clone
    assert_eq!(
        output.relevant_version_of("qPetType", &note_alias),
        type_alias
    );
    assert_eq!(output.relevant_version_of("qPetType", "qPetNote"), "qPetType");
}

#[test]
fn membership_and_containment_queries_walk_the_document() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    assert!(output.contains_id("qPetName"));
    assert!(output.contains_id("grpPets"));
    // text items contribute no output, so they are not in the document
    assert!(!output.contains_id("txtIntro"));

    let children = output.child_ids("grpPets");
    let names: Vec<&str> = children.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["qPetName", "qPetType", "qPetNote"]);

    output.declare_new_array_item("grpPets").expect("declare");
    assert_eq!(output.child_ids("grpPets").len(), 6);

    let versions = output.all_versions_of_id("qPetName");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0], "qPetName");
    // asking through the alias yields the same family
    assert_eq!(output.all_versions_of_id(&versions[1]), versions);
}

#[test]
fn details_lookup_covers_replicated_aliases() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut output = FormOutput::new(&tree);
    output.declare_new_array_item("grpPets").expect("declare");
    let lookup = output.details_lookup();
    for (alias, canonical) in output.store().aliases() {
        assert_eq!(
            lookup.get(alias).map(|details| details.output_key()),
            lookup.get(canonical).map(|details| details.output_key()),
        );
    }
}

#[test]
fn resumed_sessions_match_the_live_session() {
    let tree = FormTree::load(fixture()).expect("fixture");
    let mut live = FormOutput::new(&tree);
    live.declare_new_array_item("grpPets").expect("declare");
    live.answer_input_question("qName", json!("Ada")).expect("answer");

    let answers = live.store().document().clone();
    let aliases = live.store().aliases().clone();
    let resumed = FormOutput::resume(&tree, answers, aliases);

    assert_eq!(resumed.store().document(), live.store().document());
    assert_eq!(resumed.render_table(), live.render_table());
    assert_eq!(resumed.export_value(true), live.export_value(true));
}
