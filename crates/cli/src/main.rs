use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use otto_api::OttoClient;
use otto_engine::{CoalescerConfig, EntityCoalescer, EntityStore, HttpEntityStore, InMemoryEntityStore};
use otto_types::{ChangeSet, Entity, EntityId, ModelProviderId, ResourceKind, UpdateStatus, model_provider, workflow};
use otto_util::{ConsoleConfig, mask_provider_config, redact_json};
use serde_json::Value;
use tracing::debug;

const PROVIDER_CONFIG_MASK: &str = "********";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    let mut config = ConsoleConfig::load().context("load console config")?;
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.api_base_url = Some(base_url.clone());
    }
    if let Some(debounce_ms) = matches.get_one::<u64>("debounce-ms") {
        config.save_debounce_ms = Some(*debounce_ms);
    }
    let offline = matches.get_flag("offline");

    match matches.subcommand() {
        Some(("workflow", sub)) => run_entity_cmd(ResourceKind::Workflows, &config, offline, sub).await,
        Some(("agent", sub)) => run_entity_cmd(ResourceKind::Agents, &config, offline, sub).await,
        Some(("providers", sub)) => run_providers_cmd(&config, offline, sub).await,
        _ => bail!("expected a subcommand; see --help"),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new("otto-console")
        .about("Inspect and edit Otto workflows, agents and model providers")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .action(ArgAction::Set)
                .help("Otto API base URL (overrides OTTO_BASE_URL and the config file)"),
        )
        .arg(
            Arg::new("debounce-ms")
                .long("debounce-ms")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u64))
                .help("Quiet window before edits are saved, in milliseconds"),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Use an in-memory store instead of the API"),
        )
        .subcommand(entity_command("workflow", "Show, list and edit workflows"))
        .subcommand(entity_command("agent", "Show, list and edit agents"))
        .subcommand(
            Command::new("providers")
                .about("Model provider metadata and configuration")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List known model providers"))
                .subcommand(
                    Command::new("show")
                        .about("Show links and required fields for a provider")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    Command::new("config")
                        .about("Fetch a provider's configuration with secrets masked")
                        .arg(Arg::new("id").required(true)),
                ),
        )
}

fn entity_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .subcommand_required(true)
        .subcommand(Command::new("list").about(format!("List {name}s")))
        .subcommand(
            Command::new("show")
                .about(format!("Print one {name} as JSON"))
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("edit")
                .about(format!("Edit a {name}; changes are coalesced into one save"))
                .arg(Arg::new("id").required(true))
                .arg(
                    Arg::new("set")
                        .long("set")
                        .action(ArgAction::Append)
                        .value_name("FIELD=VALUE")
                        .help("Set a field; VALUE is parsed as JSON, falling back to a string"),
                )
                .arg(
                    Arg::new("add-tool")
                        .long("add-tool")
                        .action(ArgAction::Append)
                        .value_name("TOOL")
                        .help("Attach a tool; saved immediately"),
                )
                .arg(
                    Arg::new("remove-tool")
                        .long("remove-tool")
                        .action(ArgAction::Append)
                        .value_name("TOOL")
                        .help("Detach a tool; saved immediately"),
                ),
        )
}

async fn run_entity_cmd(kind: ResourceKind, config: &ConsoleConfig, offline: bool, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => {
            if offline {
                bail!("listing {kind} is only available from the API");
            }
            let entities = api_client(config)?
                .list_resources(kind)
                .await
                .with_context(|| format!("list {kind}"))?;
            if entities.is_empty() {
                println!("No {kind} found");
            }
            for entity in entities {
                let id = entity.get("id").and_then(Value::as_str).unwrap_or("-");
                let name = entity.get(workflow::NAME).and_then(Value::as_str).unwrap_or("");
                println!("{id}\t{name}");
            }
        }
        Some(("show", sub)) => {
            let id = entity_id(sub)?;
            let store = entity_store(kind, config, offline, &id)?;
            let entity = store.read(&id).await.with_context(|| format!("read {} {id}", kind.singular()))?;
            println!("{}", serde_json::to_string_pretty(&redact_json(&entity.to_json()))?);
        }
        Some(("edit", sub)) => {
            let id = entity_id(sub)?;
            let edit = EntityEdit::from_matches(sub)?;
            if edit.is_empty() {
                bail!("nothing to edit; pass --set FIELD=VALUE, --add-tool TOOL or --remove-tool TOOL");
            }

            let store = entity_store(kind, config, offline, &id)?;
            let coalescer_config = CoalescerConfig::with_quiet_window(config.save_debounce());
            let coalescer = EntityCoalescer::load(id.clone(), store, coalescer_config)
                .await
                .with_context(|| format!("read {} {id}", kind.singular()))?;
            let entity = edit_entity(&coalescer, edit).await?;
            println!("{}", serde_json::to_string_pretty(&redact_json(&entity.to_json()))?);
        }
        _ => bail!("expected one of: list, show, edit"),
    }
    Ok(())
}

/// Edits requested on the command line for one entity.
#[derive(Debug, Default)]
struct EntityEdit {
    /// One change set per `--set`, applied in order.
    changes: Vec<ChangeSet>,
    add_tools: Vec<String>,
    remove_tools: Vec<String>,
}

impl EntityEdit {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let strings = |name: &str| -> Vec<String> { matches.get_many::<String>(name).into_iter().flatten().cloned().collect() };
        let changes = strings("set")
            .iter()
            .map(|raw| parse_assignment(raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            changes,
            add_tools: strings("add-tool"),
            remove_tools: strings("remove-tool"),
        })
    }

    fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.add_tools.is_empty() && self.remove_tools.is_empty()
    }
}

/// Apply edits through the coalescer, echoing status transitions until it settles.
///
/// Field changes share one quiet window; tool changes are saved immediately.
async fn edit_entity(coalescer: &EntityCoalescer, edit: EntityEdit) -> Result<Entity> {
    let mut updates = coalescer.subscribe();

    for change in edit.changes {
        coalescer.apply_change(change);
    }
    for tool in &edit.add_tools {
        match workflow::add_tool_change(&coalescer.snapshot(), tool) {
            Some(change) => {
                coalescer.apply_change_now(change);
            }
            None => debug!(%tool, "tool already attached"),
        }
    }
    for tool in &edit.remove_tools {
        match workflow::remove_tool_change(&coalescer.snapshot(), tool) {
            Some(change) => {
                coalescer.apply_change_now(change);
            }
            None => debug!(%tool, "tool not attached"),
        }
    }

    let settle = coalescer.settle();
    tokio::pin!(settle);
    let status = loop {
        tokio::select! {
            result = &mut settle => break result?,
            Ok(()) = updates.changed() => print_status(&updates.borrow_and_update()),
        }
    };
    if updates.has_changed().unwrap_or(false) {
        print_status(&updates.borrow_and_update());
    }

    if let UpdateStatus::Failed { failure, .. } = &status {
        bail!("save failed ({:?}): {}", failure.kind, failure.message);
    }
    Ok(coalescer.snapshot())
}

fn print_status(status: &UpdateStatus) {
    if !status.indicator().is_empty() {
        eprintln!("{}", status.indicator());
    }
}

async fn run_providers_cmd(config: &ConsoleConfig, offline: bool, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => {
            for id in ModelProviderId::ALL {
                let info = model_provider::info(id);
                let marker = if info.recommended { " (recommended)" } else { "" };
                println!("{id}\t{}{marker}\t{}", id.display_name(), info.link);
            }
        }
        Some(("show", sub)) => {
            let info = provider_arg(sub)?;
            println!("{} ({})", info.id.display_name(), info.id);
            println!("Homepage: {}", info.link);
            if let Some(link) = info.configuration_link {
                println!("Configuration guide: {link}");
            }
            if info.recommended {
                println!("Recommended");
            }
            for (field, tooltip) in &info.required_field_tooltips {
                println!("  {field}: {tooltip}");
            }
        }
        Some(("config", sub)) => {
            let info = provider_arg(sub)?;
            if offline {
                bail!("provider configuration is only available from the API");
            }
            let provider = api_client(config)?
                .get_resource(ResourceKind::ModelProviders, info.id.as_str())
                .await
                .with_context(|| format!("fetch configuration for {}", info.id))?;
            println!("{}", serde_json::to_string_pretty(&mask_provider(provider))?);
        }
        _ => bail!("expected one of: list, show, config"),
    }
    Ok(())
}

fn provider_arg(matches: &ArgMatches) -> Result<&'static model_provider::ModelProviderInfo> {
    let raw = matches.get_one::<String>("id").context("missing provider id")?;
    model_provider::lookup(raw).ok_or_else(|| anyhow!("unknown model provider '{raw}'; see `providers list`"))
}

/// Mask the provider's `config` object, or the whole body when it has none.
fn mask_provider(provider: Value) -> Value {
    match provider {
        Value::Object(mut object) => match object.get("config") {
            Some(Value::Object(config)) => {
                let masked = mask_provider_config(config, PROVIDER_CONFIG_MASK);
                object.insert("config".to_string(), Value::Object(masked));
                Value::Object(object)
            }
            _ => Value::Object(mask_provider_config(&object, PROVIDER_CONFIG_MASK)),
        },
        other => redact_json(&other),
    }
}

fn api_client(config: &ConsoleConfig) -> Result<OttoClient> {
    OttoClient::new(&config.client_settings()).context("configure Otto API client")
}

fn entity_store(kind: ResourceKind, config: &ConsoleConfig, offline: bool, id: &EntityId) -> Result<Arc<dyn EntityStore>> {
    if offline {
        let store = InMemoryEntityStore::with_entities([Entity::new(id.clone())]);
        return Ok(Arc::new(store));
    }
    Ok(Arc::new(HttpEntityStore::new(api_client(config)?, kind)))
}

fn entity_id(matches: &ArgMatches) -> Result<EntityId> {
    let raw = matches.get_one::<String>("id").context("missing id")?;
    EntityId::new(raw.as_str()).map_err(|error| anyhow!("invalid id '{raw}': {error}"))
}

/// Parse `field=value` into a one-field change set.
fn parse_assignment(raw: &str) -> Result<ChangeSet> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("empty field name in '{raw}'");
    }
    if field == otto_types::ID_FIELD {
        bail!("the id field cannot be edited");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(ChangeSet::new().set(field, value))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use otto_engine::StoreError;
    use serde_json::json;

    /// Store that records every update and optionally rejects all of them.
    #[derive(Default)]
    struct RecordingStore {
        updates: Mutex<Vec<Value>>,
        failure: Option<StoreError>,
    }

    #[async_trait::async_trait]
    impl EntityStore for RecordingStore {
        async fn read(&self, id: &EntityId) -> Result<Entity, StoreError> {
            Err(StoreError::NotFound { id: id.clone() })
        }

        async fn update(&self, _id: &EntityId, entity: &Entity) -> Result<Entity, StoreError> {
            self.updates.lock().unwrap().push(entity.to_json());
            match &self.failure {
                Some(error) => Err(error.clone()),
                None => Ok(entity.clone()),
            }
        }
    }

    fn editing(store: &Arc<RecordingStore>) -> EntityCoalescer {
        let entity = Entity::from_json(json!({"id": "w1", "name": "A", "tools": ["files"]})).unwrap();
        let store: Arc<dyn EntityStore> = store.clone();
        EntityCoalescer::spawn(entity, store, CoalescerConfig::default())
    }

    fn sample_edit() -> EntityEdit {
        EntityEdit {
            changes: vec![parse_assignment("name=B").unwrap(), parse_assignment("description=d").unwrap()],
            add_tools: vec!["search".into()],
            remove_tools: vec!["files".into()],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn edit_saves_fields_and_tools_in_one_update() {
        let store = Arc::new(RecordingStore::default());
        let coalescer = editing(&store);

        let entity = edit_entity(&coalescer, sample_edit()).await.unwrap();

        let expected = json!({"id": "w1", "name": "B", "tools": ["search"], "description": "d"});
        assert_eq!(entity.to_json(), expected);
        assert_eq!(*store.updates.lock().unwrap(), vec![expected]);
        assert!(!coalescer.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_fails_when_the_save_is_rejected() {
        let store = Arc::new(RecordingStore {
            failure: Some(StoreError::validation(422, "name too long")),
            ..RecordingStore::default()
        });
        let coalescer = editing(&store);

        let error = edit_entity(&coalescer, sample_edit()).await.unwrap_err();

        assert!(error.to_string().contains("name too long"), "{error}");
        assert_eq!(store.updates.lock().unwrap().len(), 1);
        assert!(coalescer.has_unsaved_changes());
    }

    #[tokio::test]
    async fn listing_offline_is_refused() {
        let matches = build_cli()
            .try_get_matches_from(["otto-console", "--offline", "workflow", "list"])
            .unwrap();
        let (_, workflow) = matches.subcommand().unwrap();

        let error = run_entity_cmd(ResourceKind::Workflows, &ConsoleConfig::default(), true, workflow)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("only available from the API"), "{error}");
    }

    #[test]
    fn edit_flags_are_collected() {
        let matches = build_cli()
            .try_get_matches_from(["otto-console", "agent", "edit", "a1", "--remove-tool", "files", "--set", "name=B"])
            .unwrap();
        let (_, agent) = matches.subcommand().unwrap();
        let (_, edit) = agent.subcommand().unwrap();
        let edit = EntityEdit::from_matches(edit).unwrap();

        assert_eq!(edit.changes.len(), 1);
        assert!(edit.add_tools.is_empty());
        assert_eq!(edit.remove_tools, vec!["files".to_string()]);
        assert!(!edit.is_empty());
    }

    #[test]
    fn assignment_values_parse_as_json_or_string() {
        assert_eq!(parse_assignment("count=3").unwrap().get("count"), Some(&json!(3)));
        assert_eq!(parse_assignment("tools=[\"a\"]").unwrap().get("tools"), Some(&json!(["a"])));
        assert_eq!(parse_assignment("name=nightly build").unwrap().get("name"), Some(&json!("nightly build")));
        assert_eq!(parse_assignment("expr=a=b").unwrap().get("expr"), Some(&json!("a=b")));
    }

    #[test]
    fn assignment_rejects_malformed_input() {
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
        assert!(parse_assignment("id=w2").is_err());
    }

    #[test]
    fn provider_config_is_masked() {
        let provider = json!({
            "id": "openai-model-provider",
            "config": {"OBOT_OPENAI_MODEL_PROVIDER_API_KEY": "sk-live"}
        });
        let masked = mask_provider(provider);
        assert_eq!(masked["config"]["OBOT_OPENAI_MODEL_PROVIDER_API_KEY"], json!(PROVIDER_CONFIG_MASK));
        assert_eq!(masked["id"], json!("openai-model-provider"));
    }

    #[test]
    fn cli_accepts_edit_with_repeated_flags() {
        let matches = build_cli()
            .try_get_matches_from([
                "otto-console",
                "--debounce-ms",
                "250",
                "workflow",
                "edit",
                "w1",
                "--set",
                "name=B",
                "--set",
                "description=d",
                "--add-tool",
                "search",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<u64>("debounce-ms"), Some(&250));
        let (_, workflow) = matches.subcommand().unwrap();
        let (_, edit) = workflow.subcommand().unwrap();
        assert_eq!(edit.get_many::<String>("set").unwrap().count(), 2);
    }
}
