mod wizard;

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use component_form::{default_output, definition_schema, export_output};
use form_spec::{
    ChildKind, FormDetailsPatch, FormOutput, FormTree, InputType, ItemBody, ItemDetailsPatch,
    ItemKind, NodeDetails, Placement, QuestionKind, QuestionType,
};
use wizard::{Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Branching form toolkit",
    long_about = "Scaffolds, inspects, fills, and exports nested branching form definitions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter form definition to edit from
    New { path: PathBuf },
    /// Print a form's structure as an outline
    Show { form: PathBuf },
    /// Print the default answer skeleton of a form
    Skeleton { form: PathBuf },
    /// Print the JSON schema for serialized form definitions
    Schema,
    /// Fill a form interactively, page by page
    Fill {
        form: PathBuf,
        /// Write the finished session state to this file
        #[arg(long)]
        save_session: Option<PathBuf>,
        /// Print skipped questions and current values
        #[arg(long)]
        verbose: bool,
        /// Drop hidden subtrees from the final export
        #[arg(long)]
        filter_export: bool,
    },
    /// Export a saved session with author-facing keys
    Export {
        form: PathBuf,
        session: PathBuf,
        /// Drop hidden subtrees
        #[arg(long)]
        filter: bool,
    },
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::New { path } => {
            let tree = build_starter_tree()?;
            fs::write(&path, tree.export()?)?;
            println!("Wrote starter form to {}", path.display());
            Ok(())
        }
        Command::Show { form } => {
            let tree = load_tree(&form)?;
            print_outline(&tree, tree.root_id(), 0);
            Ok(())
        }
        Command::Skeleton { form } => {
            let source = fs::read_to_string(&form)?;
            println!("{}", default_output(&source));
            Ok(())
        }
        Command::Schema => {
            println!("{}", definition_schema());
            Ok(())
        }
        Command::Fill {
            form,
            save_session,
            verbose,
            filter_export,
        } => run_fill(&form, save_session.as_deref(), verbose, filter_export),
        Command::Export {
            form,
            session,
            filter,
        } => {
            let form_json = fs::read_to_string(&form)?;
            let session_json = fs::read_to_string(&session)?;
            println!("{}", export_output(&form_json, &session_json, filter));
            Ok(())
        }
    }
}

fn load_tree(path: &Path) -> CliResult<FormTree> {
    let source = fs::read_to_string(path)?;
    Ok(FormTree::load(&source)?)
}

// Scaffolding ----------------------------------------------------------------

/// Two pages of common shapes, built entirely through the public API.
fn build_starter_tree() -> CliResult<FormTree> {
    let mut tree = FormTree::new();
    let root = tree.root_id().to_string();
    tree.update_form_details(
        &root,
        &FormDetailsPatch {
            output_key: Some("starter_form".to_string()),
            ..Default::default()
        },
    );

    let page = tree
        .insert_form(&root, Placement::Append)
        .ok_or("could not create page")?;
    tree.update_form_details(
        &page,
        &FormDetailsPatch {
            output_key: Some("profile".to_string()),
            ..Default::default()
        },
    );
    let card = tree
        .insert_form(&page, Placement::Append)
        .ok_or("could not create card")?;
    tree.update_form_details(
        &card,
        &FormDetailsPatch {
            output_key: Some("basics".to_string()),
            ..Default::default()
        },
    );

    let intro = tree
        .insert_item(&card, ItemKind::Text, Placement::Append)
        .ok_or("could not create text item")?;
    tree.update_item_details(
        &intro,
        &ItemDetailsPatch {
            title: Some("Welcome".to_string()),
            description: Some("A starter form to edit.".to_string()),
            ..Default::default()
        },
    );

    let name = tree
        .insert_item(&card, ItemKind::Question, Placement::Append)
        .ok_or("could not create question")?;
    tree.update_item_details(
        &name,
        &ItemDetailsPatch {
            title: Some("Your name".to_string()),
            output_key: Some("name".to_string()),
            prompt: Some("name...".to_string()),
            ..Default::default()
        },
    );

    let coffee = tree
        .insert_item(&card, ItemKind::Question, Placement::Append)
        .ok_or("could not create question")?;
    tree.convert_question_type(&coffee, QuestionType::MultipleChoice);
    tree.update_item_details(
        &coffee,
        &ItemDetailsPatch {
            title: Some("Coffee orders".to_string()),
            output_key: Some("coffee_orders".to_string()),
            min_selected: Some(0),
            max_selected: Some(2),
            choices: Some(vec![
                "espresso".to_string(),
                "filter".to_string(),
                "decaf".to_string(),
            ]),
            ..Default::default()
        },
    );

    let pets = tree
        .insert_form(&card, Placement::Append)
        .ok_or("could not create group")?;
    tree.update_form_details(
        &pets,
        &FormDetailsPatch {
            output_key: Some("pets".to_string()),
            max_instances: Some(3),
            new_instance_label: Some("Add a pet".to_string()),
            ..Default::default()
        },
    );
    let pet_name = tree
        .insert_item(&pets, ItemKind::Question, Placement::Append)
        .ok_or("could not create question")?;
    tree.update_item_details(
        &pet_name,
        &ItemDetailsPatch {
            title: Some("Pet name".to_string()),
            output_key: Some("pet_name".to_string()),
            prompt: Some("name...".to_string()),
            ..Default::default()
        },
    );

    let page_two = tree
        .insert_form(&root, Placement::Append)
        .ok_or("could not create page")?;
    tree.update_form_details(
        &page_two,
        &FormDetailsPatch {
            output_key: Some("wrap_up".to_string()),
            ..Default::default()
        },
    );
    let card_two = tree
        .insert_form(&page_two, Placement::Append)
        .ok_or("could not create card")?;
    tree.update_form_details(
        &card_two,
        &FormDetailsPatch {
            output_key: Some("wrap".to_string()),
            ..Default::default()
        },
    );
    let feedback = tree
        .insert_item(&card_two, ItemKind::Question, Placement::Append)
        .ok_or("could not create question")?;
    tree.update_item_details(
        &feedback,
        &ItemDetailsPatch {
            title: Some("Any feedback?".to_string()),
            output_key: Some("feedback".to_string()),
            prompt: Some("feedback...".to_string()),
            ..Default::default()
        },
    );

    Ok(tree)
}

// Outline --------------------------------------------------------------------

fn print_outline(tree: &FormTree, form_id: &str, depth: usize) {
    let Some(form) = tree.form(form_id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    println!(
        "{}[{}] {} -> {}",
        indent,
        form.container_type.as_str(),
        form.id,
        form.details.output_key
    );
    for child in &form.children {
        match child.kind {
            ChildKind::Form => print_outline(tree, &child.id, depth + 1),
            ChildKind::Item => {
                let Some(item) = tree.item(&child.id) else {
                    continue;
                };
                let indent = "  ".repeat(depth + 1);
                match &item.body {
                    ItemBody::Text(text) => {
                        println!("{}text {} \"{}\"", indent, item.id, text.title);
                    }
                    ItemBody::Question(question) => {
                        let kind = match question.kind {
                            QuestionKind::Input { .. } => "input",
                            QuestionKind::MultipleChoice { .. } => "choice",
                        };
                        println!(
                            "{}{} {} \"{}\" -> {}",
                            indent, kind, item.id, question.title, question.output_key
                        );
                    }
                }
            }
        }
    }
}

// Wizard ---------------------------------------------------------------------

fn run_fill(
    form: &Path,
    save_session: Option<&Path>,
    verbose: bool,
    filter_export: bool,
) -> CliResult<()> {
    let tree = load_tree(form)?;
    let mut output = FormOutput::new(&tree);
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));
    let stdin = io::stdin();
    let mut reader = stdin.lock();

    let pages: Vec<String> = tree
        .root()
        .children
        .iter()
        .map(|child| child.id.clone())
        .collect();
    presenter.show_header(&tree.root().details.output_key, pages.len());

    for (page_index, page_id) in pages.iter().enumerate() {
        presenter.show_page(page_index, pages.len());
        // pages with no output contribute nothing to fill
        if output.store().get(page_id).is_none() {
            continue;
        }
        fill_container(
            &mut output,
            &tree,
            &mut presenter,
            &mut reader,
            page_index,
            page_id,
        )?;
    }

    presenter.show_export(&output.export(filter_export)?);

    if let Some(path) = save_session {
        let state = json!({
            "answers": output.store().document(),
            "aliases": output.store().aliases(),
        });
        fs::write(path, serde_json::to_string_pretty(&state)?)?;
        presenter.show_saved(path);
    }
    Ok(())
}

fn fill_container(
    output: &mut FormOutput,
    tree: &FormTree,
    presenter: &mut WizardPresenter,
    reader: &mut dyn BufRead,
    page_index: usize,
    container_id: &str,
) -> CliResult<()> {
    match output.store().get(container_id) {
        Some(Value::Object(map)) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in &keys {
                fill_node(output, tree, presenter, reader, page_index, key)?;
            }
            Ok(())
        }
        Some(Value::Array(_)) => fill_group(output, tree, presenter, reader, page_index, container_id),
        _ => Ok(()),
    }
}

fn fill_group(
    output: &mut FormOutput,
    tree: &FormTree,
    presenter: &mut WizardPresenter,
    reader: &mut dyn BufRead,
    page_index: usize,
    group_id: &str,
) -> CliResult<()> {
    let mut index = 0;
    loop {
        match instance_keys(output, group_id, index) {
            Some(keys) => {
                for key in &keys {
                    fill_node(output, tree, presenter, reader, page_index, key)?;
                }
                index += 1;
            }
            None => {
                if let Some(label) = room_for_another(output, group_id) {
                    presenter.ask_new_instance(&label);
                    if read_yes(reader)? {
                        output.declare_new_array_item(group_id)?;
                        continue;
                    }
                }
                return Ok(());
            }
        }
    }
}

fn instance_keys(output: &FormOutput, group_id: &str, index: usize) -> Option<Vec<String>> {
    match output.store().get(group_id) {
        Some(Value::Array(instances)) => instances
            .get(index)
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect()),
        _ => None,
    }
}

/// The add-instance label, when the group still has capacity.
fn room_for_another(output: &FormOutput, group_id: &str) -> Option<String> {
    let instances = output.store().get(group_id)?.as_array()?.len();
    let lookup = output.details_lookup();
    let NodeDetails::Form(details) = lookup.get(group_id)? else {
        return None;
    };
    ((instances as u32) < details.max_instances).then(|| details.new_instance_label.clone())
}

fn fill_node(
    output: &mut FormOutput,
    tree: &FormTree,
    presenter: &mut WizardPresenter,
    reader: &mut dyn BufRead,
    page_index: usize,
    id: &str,
) -> CliResult<()> {
    let mut table = output.render_table();
    tree.apply_page_visibility(&mut table, page_index);
    let lookup = output.details_lookup();
    let Some(details) = lookup.get(id) else {
        return Ok(());
    };
    if table.get(id).copied() == Some(false) {
        let title = match details {
            NodeDetails::Form(form) => form.output_key.as_str(),
            NodeDetails::Text(text) => text.title.as_str(),
            NodeDetails::Question(question) => question.title.as_str(),
        };
        presenter.show_skipped(title);
        return Ok(());
    }
    match details {
        NodeDetails::Form(_) => fill_container(output, tree, presenter, reader, page_index, id),
        NodeDetails::Text(_) => Ok(()),
        NodeDetails::Question(question) => match &question.kind {
            QuestionKind::Input {
                input_type, prompt, ..
            } => {
                let current = output
                    .store()
                    .get(id)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                presenter.ask_input(&question.title, prompt, &current);
                let line = read_line(reader)?;
                if line.is_empty() {
                    return Ok(());
                }
                let value = match input_type {
                    InputType::Number => line
                        .parse::<i64>()
                        .map(Value::from)
                        .or_else(|_| line.parse::<f64>().map(|parsed| json!(parsed)))
                        .unwrap_or_else(|_| Value::String(line.clone())),
                    InputType::Text => Value::String(line.clone()),
                };
                output.answer_input_question(id, value)?;
                Ok(())
            }
            QuestionKind::MultipleChoice { choices, .. } => {
                let selected: Vec<String> = output
                    .store()
                    .get(id)
                    .and_then(Value::as_array)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|entry| entry.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                presenter.ask_choice(&question.title, choices, &selected);
                let line = read_line(reader)?;
                if line.is_empty() {
                    return Ok(());
                }
                if line == "0" {
                    output.answer_multiple_choice(id, None)?;
                    return Ok(());
                }
                if let Ok(number) = line.parse::<usize>()
                    && number >= 1
                    && number <= choices.len()
                {
                    output.answer_multiple_choice(id, Some(&choices[number - 1]))?;
                }
                Ok(())
            }
        },
    }
}

fn read_line(reader: &mut dyn BufRead) -> CliResult<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_yes(reader: &mut dyn BufRead) -> CliResult<bool> {
    Ok(read_line(reader)?.eq_ignore_ascii_case("y"))
}
