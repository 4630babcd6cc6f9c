//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueHint};

use crate::application::services::OrphanPolicy;
use crate::domain::{BscScope, EntityType, OrgLevel};

/// Corporate and organizational structure engine: legal entity tree, org units,
/// BSC ownership and role resolution
#[derive(Parser, Debug)]
#[command(name = "orgtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory holding .orgtree.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Snapshot file (overrides config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new snapshot, optionally with a root corporation
    Init {
        /// Name of the root corporation
        #[arg(long)]
        corporation: Option<String>,
        /// Code of the root corporation
        #[arg(long, default_value = "")]
        code: String,
        /// Overwrite an existing snapshot
        #[arg(short, long)]
        force: bool,
    },

    /// Show the corporate tree, or the org tree of one company
    Tree {
        /// Company whose org units to show
        #[arg(long)]
        company: Option<String>,
    },

    /// Edit the corporate tree
    Entity {
        #[command(subcommand)]
        command: EntityCommands,
    },

    /// Edit the org tree
    Unit {
        #[command(subcommand)]
        command: UnitCommands,
    },

    /// Manage users and role assignments
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Structural queries
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },

    /// Resolve BSC ownership
    Bsc {
        #[command(subcommand)]
        command: BscCommands,
    },

    /// Effective role and permissions of a user
    Role {
        /// User id
        user: String,
        /// Corporate entity scope
        #[arg(long, conflicts_with = "unit")]
        entity: Option<String>,
        /// Org unit scope
        #[arg(long)]
        unit: Option<String>,
        /// Show which assignment produced the role
        #[arg(long)]
        explain: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Where to move a node: relative to a sibling, into a parent, or to the root.
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["before", "after", "into", "root"])))]
pub struct MoveTarget {
    /// Place before this sibling
    #[arg(long)]
    pub before: Option<String>,
    /// Place after this sibling
    #[arg(long)]
    pub after: Option<String>,
    /// Make a child of this node
    #[arg(long)]
    pub into: Option<String>,
    /// Move to the root level
    #[arg(long)]
    pub root: bool,
    /// Position among the new siblings (with --into or --root; default: last)
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum EntityCommands {
    /// Add a corporate entity
    Add {
        /// Display name
        name: String,
        /// corporation | holding | company
        #[arg(short = 't', long = "type")]
        entity_type: EntityType,
        /// Parent entity (omit for a root corporation)
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(long, default_value = "")]
        code: String,
        /// Explicit id (default: generated)
        #[arg(long)]
        id: Option<String>,
        /// Entity owns a BSC with this scope
        #[arg(long)]
        bsc: Option<BscScope>,
    },

    /// Rename a corporate entity
    Rename { id: String, name: String },

    /// Update attributes of a corporate entity
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        has_bsc: Option<bool>,
        #[arg(long)]
        bsc_scope: Option<BscScope>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a corporate entity
    Delete {
        id: String,
        /// reparent | reject | cascade (default from config)
        #[arg(long)]
        policy: Option<OrphanPolicy>,
    },

    /// Move a corporate entity
    Move {
        id: String,
        #[command(flatten)]
        target: MoveTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum UnitCommands {
    /// Add an org unit
    Add {
        /// Display name
        name: String,
        /// directorate | division | department | section
        #[arg(short, long)]
        level: OrgLevel,
        /// Owning company
        #[arg(short, long)]
        company: String,
        /// Parent unit (omit for a top-level directorate)
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(long, default_value = "")]
        code: String,
        /// Explicit id (default: generated)
        #[arg(long)]
        id: Option<String>,
        /// Unit owns a BSC
        #[arg(long)]
        bsc: bool,
        /// Take the BSC from this unit instead of the parent
        #[arg(long)]
        inherit_from: Option<String>,
    },

    /// Rename an org unit
    Rename { id: String, name: String },

    /// Update attributes of an org unit
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        has_bsc: Option<bool>,
        /// Take the BSC from this unit instead of the parent
        #[arg(long, conflicts_with = "clear_inherit")]
        inherit_from: Option<String>,
        /// Remove the BSC override
        #[arg(long)]
        clear_inherit: bool,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete an org unit
    Delete {
        id: String,
        /// reparent | reject | cascade (default from config)
        #[arg(long)]
        policy: Option<OrphanPolicy>,
    },

    /// Move an org unit within its company
    Move {
        id: String,
        #[command(flatten)]
        target: MoveTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Add a user
    Add {
        id: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// Grant system administrator rights
        #[arg(long)]
        system_admin: bool,
    },

    /// Grant a role (global unless --entity or --unit is given)
    Grant {
        user: String,
        /// admin | editor | viewer
        role: crate::domain::Role,
        #[arg(long, conflicts_with = "unit")]
        entity: Option<String>,
        #[arg(long)]
        unit: Option<String>,
        /// Do not extend the role to descendants
        #[arg(long)]
        no_inherit: bool,
    },

    /// Revoke an assignment
    Revoke { assignment: String },

    /// List users and their assignments
    List,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommands {
    /// Direct children in display order
    Children {
        id: String,
        /// Query the org tree instead of the corporate tree
        #[arg(short, long)]
        unit: bool,
    },
    /// Ancestors from the root down to the parent
    Ancestors {
        id: String,
        #[arg(short, long)]
        unit: bool,
    },
    /// All nodes below, breadth-first
    Descendants {
        id: String,
        #[arg(short, long)]
        unit: bool,
    },
    /// Other nodes with the same parent
    Siblings {
        id: String,
        #[arg(short, long)]
        unit: bool,
    },
    /// All companies
    Companies,
    /// Root corporations
    Roots,
    /// Org units of one level
    Level {
        level: OrgLevel,
        #[arg(long)]
        company: Option<String>,
    },
    /// All org units of a company
    Units { company: String },
}

#[derive(Subcommand, Debug)]
pub enum BscCommands {
    /// Unit whose BSC applies to an org unit
    Owner {
        unit: String,
        /// Show the inheritance chain
        #[arg(long)]
        explain: bool,
    },
    /// Nearest corporate entity owning a BSC
    Entity { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a commented config template
    Template,

    /// Show config paths
    Path,
}
