//! Command dispatch: load the snapshot, run one operation, save on change.

use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{
    AuthorityResolver, BscResolver, DeleteReport, DropPosition, Hierarchy, MutationService,
    OrphanPolicy, QueryFacade,
};
use crate::cli::args::{
    BscCommands, Cli, Commands, ConfigCommands, EntityCommands, MoveTarget, QueryCommands,
    UnitCommands, UserCommands,
};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{
    permissions_for, CorporateEntity, DomainResult, EntityPatch, EntityType, HierarchyNode,
    NewEntity, NewUnit, OrgUnit, RoleScope, TreeStore, UnitPatch, User, UserEntityAssignment,
};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Execute the parsed command line.
pub fn execute(cli: Cli) -> CliResult<()> {
    let Some(command) = cli.command else {
        return Err(CliError::Usage("no command given, see --help".into()));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("determine current directory", e))?,
    };
    let settings = Settings::load(Some(&project_dir))?;
    let snapshot = cli.snapshot.unwrap_or_else(|| settings.snapshot.clone());
    let container = ServiceContainer::new(settings);
    let ctx = Context {
        container,
        snapshot,
        project_dir,
    };

    match command {
        Commands::Init {
            corporation,
            code,
            force,
        } => ctx.init(corporation, code, force),
        Commands::Tree { company } => ctx.tree(company.as_deref()),
        Commands::Entity { command } => ctx.entity(command),
        Commands::Unit { command } => ctx.unit(command),
        Commands::User { command } => ctx.user(command),
        Commands::Query { command } => ctx.query(command),
        Commands::Bsc { command } => ctx.bsc(command),
        Commands::Role {
            user,
            entity,
            unit,
            explain,
        } => ctx.role(&user, entity, unit, explain),
        Commands::Config { command } => ctx.config(command),
        Commands::Completion { .. } => Ok(()),
    }
}

struct Context {
    container: ServiceContainer,
    snapshot: PathBuf,
    project_dir: PathBuf,
}

impl Context {
    fn load(&self) -> CliResult<TreeStore> {
        debug!("loading snapshot {}", self.snapshot.display());
        Ok(self
            .container
            .snapshots
            .load(&self.snapshot, &self.container.settings.hierarchy)?)
    }

    fn save(&self, store: &TreeStore) -> CliResult<()> {
        Ok(self.container.snapshots.save(&self.snapshot, store)?)
    }

    fn engine(&self) -> &MutationService {
        &self.container.mutations
    }

    /// Load, mutate and save in one step.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&MutationService, &mut TreeStore) -> CliResult<T>,
    ) -> CliResult<T> {
        let mut store = self.load()?;
        let result = f(self.engine(), &mut store)?;
        self.save(&store)?;
        Ok(result)
    }

    fn policy(&self, policy: Option<OrphanPolicy>) -> OrphanPolicy {
        policy.unwrap_or(self.container.settings.delete_policy)
    }

    #[instrument(level = "debug", skip(self))]
    fn init(&self, corporation: Option<String>, code: String, force: bool) -> CliResult<()> {
        if self.container.snapshots.exists(&self.snapshot) && !force {
            return Err(CliError::InvalidArgs(format!(
                "snapshot already exists: {} (use --force to overwrite)",
                self.snapshot.display()
            )));
        }
        let mut store = TreeStore::new(self.container.settings.hierarchy.clone());
        if let Some(name) = corporation {
            let root = NewEntity::new(EntityType::Corporation, name, code);
            let id = self.engine().add_entity(&mut store, root, None)?;
            output::success_detail(&format!("root corporation {id}"));
        }
        self.save(&store)?;
        output::success(&format!("initialized {}", self.snapshot.display()));
        Ok(())
    }

    fn tree(&self, company: Option<&str>) -> CliResult<()> {
        let store = self.load()?;
        let facade = QueryFacade::new(&store);
        match company {
            Some(company) => {
                let tree = facade.render_org_tree(company)?;
                output::info(&tree);
            }
            None => {
                let trees = facade.render_corporate_tree();
                if trees.is_empty() {
                    output::warning("no corporate entities");
                }
                for tree in trees {
                    output::info(&tree);
                }
            }
        }
        Ok(())
    }

    fn entity(&self, command: EntityCommands) -> CliResult<()> {
        match command {
            EntityCommands::Add {
                name,
                entity_type,
                parent,
                code,
                id,
                bsc,
            } => {
                let mut attrs = NewEntity::new(entity_type, name, code);
                if let Some(id) = id {
                    attrs = attrs.with_id(id);
                }
                if let Some(scope) = bsc {
                    attrs = attrs.with_bsc(scope);
                }
                let id = self.mutate(|engine, store| {
                    Ok(engine.add_entity(store, attrs, parent.as_deref())?)
                })?;
                output::action("Added", &id);
            }
            EntityCommands::Rename { id, name } => {
                self.mutate(|engine, store| Ok(engine.rename_entity(store, &id, &name)?))?;
                output::action("Renamed", &format!("{id} -> {name}"));
            }
            EntityCommands::Update {
                id,
                name,
                code,
                has_bsc,
                bsc_scope,
                active,
            } => {
                let patch = EntityPatch {
                    name,
                    code,
                    has_bsc,
                    bsc_scope,
                    is_active: active,
                };
                self.mutate(|engine, store| Ok(engine.update_entity(store, &id, patch)?))?;
                output::action("Updated", &id);
            }
            EntityCommands::Delete { id, policy } => {
                let policy = self.policy(policy);
                let report = self.mutate(|engine, store| {
                    Ok(engine.delete_entity(store, &id, policy)?)
                })?;
                output::action("Deleted", &format!("{id} ({policy})"));
                report_delete(&report);
            }
            EntityCommands::Move { id, target } => {
                self.mutate(|engine, store| {
                    let (parent, index) =
                        resolve_move(engine, store, Hierarchy::Corporate, &id, &target)?;
                    Ok(engine.reparent_entity(store, &id, parent.as_deref(), index)?)
                })?;
                output::action("Moved", &id);
            }
        }
        Ok(())
    }

    fn unit(&self, command: UnitCommands) -> CliResult<()> {
        match command {
            UnitCommands::Add {
                name,
                level,
                company,
                parent,
                code,
                id,
                bsc,
                inherit_from,
            } => {
                let mut attrs = NewUnit::new(level, company, name, code);
                if let Some(id) = id {
                    attrs = attrs.with_id(id);
                }
                if bsc {
                    attrs = attrs.with_bsc();
                }
                if let Some(source) = inherit_from {
                    attrs = attrs.inheriting_from(source);
                }
                let id = self.mutate(|engine, store| {
                    Ok(engine.add_unit(store, attrs, parent.as_deref())?)
                })?;
                output::action("Added", &id);
            }
            UnitCommands::Rename { id, name } => {
                self.mutate(|engine, store| Ok(engine.rename_unit(store, &id, &name)?))?;
                output::action("Renamed", &format!("{id} -> {name}"));
            }
            UnitCommands::Update {
                id,
                name,
                code,
                has_bsc,
                inherit_from,
                clear_inherit,
                active,
            } => {
                let inherit_bsc_from_id = if clear_inherit {
                    Some(None)
                } else {
                    inherit_from.map(Some)
                };
                let patch = UnitPatch {
                    name,
                    code,
                    has_bsc,
                    inherit_bsc_from_id,
                    is_active: active,
                };
                self.mutate(|engine, store| Ok(engine.update_unit(store, &id, patch)?))?;
                output::action("Updated", &id);
            }
            UnitCommands::Delete { id, policy } => {
                let policy = self.policy(policy);
                let report = self.mutate(|engine, store| {
                    Ok(engine.delete_unit(store, &id, policy)?)
                })?;
                output::action("Deleted", &format!("{id} ({policy})"));
                report_delete(&report);
            }
            UnitCommands::Move { id, target } => {
                self.mutate(|engine, store| {
                    let (parent, index) =
                        resolve_move(engine, store, Hierarchy::Org, &id, &target)?;
                    Ok(engine.reparent_unit(store, &id, parent.as_deref(), index)?)
                })?;
                output::action("Moved", &id);
            }
        }
        Ok(())
    }

    fn user(&self, command: UserCommands) -> CliResult<()> {
        match command {
            UserCommands::Add {
                id,
                name,
                email,
                system_admin,
            } => {
                let user = User {
                    id: id.clone(),
                    name,
                    email,
                    is_system_admin: system_admin,
                };
                self.mutate(|engine, store| Ok(engine.add_user(store, user)?))?;
                output::action("Added user", &id);
            }
            UserCommands::Grant {
                user,
                role,
                entity,
                unit,
                no_inherit,
            } => {
                let assignment = UserEntityAssignment {
                    id: String::new(),
                    user_id: user,
                    role,
                    corporate_entity_id: entity,
                    org_unit_id: unit,
                    inherit_to_children: !no_inherit,
                    is_active: true,
                };
                let id = self.mutate(|engine, store| Ok(engine.grant(store, assignment)?))?;
                output::action("Granted", &id);
            }
            UserCommands::Revoke { assignment } => {
                let revoked = self.mutate(|engine, store| Ok(engine.revoke(store, &assignment)?))?;
                output::action(
                    "Revoked",
                    &format!("{} ({} of {})", revoked.id, revoked.role, revoked.user_id),
                );
            }
            UserCommands::List => {
                let store = self.load()?;
                for user in store.users() {
                    let admin = if user.is_system_admin { " [system admin]" } else { "" };
                    output::header(&format!("{} {}{}", user.id, user.name, admin));
                    for a in store.assignments_for(&user.id) {
                        let scope = a
                            .corporate_entity_id
                            .as_deref()
                            .or(a.org_unit_id.as_deref())
                            .unwrap_or("global");
                        let flags = match (a.inherit_to_children, a.is_active) {
                            (_, false) => " (inactive)",
                            (false, true) => " (no inherit)",
                            (true, true) => "",
                        };
                        output::detail(&format!("{}: {} at {}{}", a.id, a.role, scope, flags));
                    }
                }
            }
        }
        Ok(())
    }

    fn query(&self, command: QueryCommands) -> CliResult<()> {
        let store = self.load()?;
        let facade = QueryFacade::new(&store);
        let result: DomainResult<()> = match command {
            QueryCommands::Children { id, unit: false } => {
                facade.entities().children_of(&id).map(|n| print_entities(&n))
            }
            QueryCommands::Children { id, unit: true } => {
                facade.units().children_of(&id).map(|n| print_units(&n))
            }
            QueryCommands::Ancestors { id, unit: false } => {
                facade.entities().ancestors_of(&id).map(|n| print_entities(&n))
            }
            QueryCommands::Ancestors { id, unit: true } => {
                facade.units().ancestors_of(&id).map(|n| print_units(&n))
            }
            QueryCommands::Descendants { id, unit: false } => {
                facade.entities().descendants_of(&id).map(|n| print_entities(&n))
            }
            QueryCommands::Descendants { id, unit: true } => {
                facade.units().descendants_of(&id).map(|n| print_units(&n))
            }
            QueryCommands::Siblings { id, unit: false } => {
                facade.entities().siblings_of(&id).map(|n| print_entities(&n))
            }
            QueryCommands::Siblings { id, unit: true } => {
                facade.units().siblings_of(&id).map(|n| print_units(&n))
            }
            QueryCommands::Companies => {
                print_entities(&facade.all_companies());
                Ok(())
            }
            QueryCommands::Roots => {
                print_entities(&facade.roots());
                Ok(())
            }
            QueryCommands::Level { level, company } => {
                output::header(&facade.level_name(level));
                print_units(&facade.units_at_level(level, company.as_deref()));
                Ok(())
            }
            QueryCommands::Units { company } => {
                facade.units_of_company(&company).map(|n| print_units(&n))
            }
        };
        Ok(result?)
    }

    fn bsc(&self, command: BscCommands) -> CliResult<()> {
        let store = self.load()?;
        let resolver = BscResolver::new(&store);
        match command {
            BscCommands::Owner { unit, explain } => {
                let resolution = resolver.explain_bsc_owner(&unit)?;
                match resolution.owner {
                    Some(owner) => output::info(&format!("{} {}", owner.id, owner.name)),
                    None => output::warning(&format!("no BSC owner for {unit}")),
                }
                if explain {
                    output::detail(&format!("basis: {}", resolution.basis));
                    output::detail(&format!("chain: {}", resolution.chain.join(" -> ")));
                }
            }
            BscCommands::Entity { id } => {
                match resolver.resolve_entity_bsc_owner(&id)? {
                    Some(owner) => output::info(&format!(
                        "{} {} ({})",
                        owner.id, owner.name, owner.bsc_scope
                    )),
                    None => output::warning(&format!("no BSC owner for {id}")),
                }
            }
        }
        Ok(())
    }

    fn role(
        &self,
        user: &str,
        entity: Option<String>,
        unit: Option<String>,
        explain: bool,
    ) -> CliResult<()> {
        let store = self.load()?;
        let scope = RoleScope {
            corporate_entity_id: entity,
            org_unit_id: unit,
        };
        let explanation = AuthorityResolver::new(&store).explain_role(user, &scope);
        output::info(&output::role(explanation.role));
        if explain {
            output::detail(&format!("basis: {}", explanation.basis));
            for (name, granted) in permissions_for(explanation.role).entries() {
                if granted {
                    output::success_detail(name);
                } else {
                    output::failure(name);
                }
            }
        }
        Ok(())
    }

    fn config(&self, command: ConfigCommands) -> CliResult<()> {
        match command {
            ConfigCommands::Show => {
                let toml = self.container.settings.to_toml()?;
                output::info(&toml);
            }
            ConfigCommands::Template => output::info(&Settings::template()),
            ConfigCommands::Path => {
                match global_config_path() {
                    Some(path) => output::action("global", &path.display()),
                    None => output::warning("no global config directory on this platform"),
                }
                output::action("local", &local_config_path(&self.project_dir).display());
                output::action("snapshot", &self.snapshot.display());
            }
        }
        Ok(())
    }
}

fn resolve_move(
    engine: &MutationService,
    store: &TreeStore,
    hierarchy: Hierarchy,
    id: &str,
    target: &MoveTarget,
) -> CliResult<(Option<String>, usize)> {
    let position = match (&target.before, &target.after, &target.into) {
        (Some(sibling), _, _) => DropPosition::Before(sibling.clone()),
        (_, Some(sibling), _) => DropPosition::After(sibling.clone()),
        (_, _, Some(parent)) => DropPosition::AsChild(parent.clone()),
        _ => return Ok((None, target.index.unwrap_or(usize::MAX))),
    };
    let (parent, index) = engine.resolve_drop_target(store, hierarchy, id, &position)?;
    match (&position, target.index) {
        (DropPosition::AsChild(_), Some(explicit)) => Ok((parent, explicit)),
        _ => Ok((parent, index)),
    }
}

fn report_delete(report: &DeleteReport) {
    for id in &report.removed_entities {
        output::removed(&format!("entity {id}"));
    }
    for id in &report.removed_units {
        output::removed(&format!("unit {id}"));
    }
    for id in &report.reparented {
        output::detail(&format!("moved up: {id}"));
    }
    if report.revoked_assignments > 0 {
        output::detail(&format!("revoked {} assignment(s)", report.revoked_assignments));
    }
}

fn print_entities(nodes: &[&CorporateEntity]) {
    for n in nodes {
        output::info(&format!("{}\t{}\t{}", n.id(), n.entity_type, n.name));
    }
}

fn print_units(nodes: &[&OrgUnit]) {
    for n in nodes {
        output::info(&format!("{}\t{}\t{}", n.id(), n.level, n.name));
    }
}
