#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use distro_toolkit::{CommandExecutor, CommandSpec, CommandStatus, RuntimeProbe, Toolkit};
use tempfile::TempDir;

pub const CONFIG: &str = "[product]\nname = \"demo\"\n";

pub const PRODUCT: &str = r#"
version = "1.0"
common_name = "Demo OS"
short_name = "demo"
homepage = "https://demo.example"
recipes = ["core"]

[environment]
ARCH = "amd64"
"#;

pub const RECIPE: &str = r#"
sdk = "base"
actions = ["build", "image"]

[environment]
FLAVOR = "hardened"
"#;

pub const SDK: &str = r#"
tag = "v1"

[bootstrap]
rootfs = "assets/stage3.tar"
steps = ["portage", "toolchain"]

[build]
capabilities = ["SYS_ADMIN"]
writable_assets = ["distfiles"]
"#;

/// A scratch source tree with product `demo`, recipe `core` and SDK `base`.
pub struct Fixture {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(CONFIG)
    }

    pub fn with_config(config: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        fs::create_dir_all(root.join(".repo")).unwrap();
        let fixture = Self { _tmp: tmp, root };
        fixture.write("config.toml", config);
        fixture.write("products/demo/product.toml", PRODUCT);
        fixture.write("products/demo/core/recipe.toml", RECIPE);
        fixture.write("products/demo/base/sdk.toml", SDK);
        fixture
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn toolkit(&self, engine: &FakeEngine) -> Toolkit {
        Toolkit::open(self.root.clone())
            .unwrap()
            .with_executor(Box::new(engine.clone()))
            .with_probe(Box::new(RootlessPodman))
    }
}

/// Host with rootless podman.
pub struct RootlessPodman;

impl RuntimeProbe for RootlessPodman {
    fn find_program(&self, program: &str) -> Option<PathBuf> {
        (program == "podman").then(|| PathBuf::from("/usr/bin/podman"))
    }

    fn current_username(&self) -> Option<String> {
        Some("builder".into())
    }

    fn subuid_table(&self) -> Option<String> {
        Some("builder:100000:65536\n".into())
    }
}

/// Host without any container engine.
pub struct NoEngine;

impl RuntimeProbe for NoEngine {
    fn find_program(&self, _program: &str) -> Option<PathBuf> {
        None
    }

    fn current_username(&self) -> Option<String> {
        None
    }

    fn subuid_table(&self) -> Option<String> {
        None
    }
}

type RunHook = Box<dyn FnMut(&CommandSpec)>;

#[derive(Default)]
pub struct EngineState {
    /// Local image store, podman-style references (`localhost/...`).
    pub images: BTreeSet<String>,
    /// Images available from remote registries.
    pub remote: BTreeSet<String>,
    pub commands: Vec<CommandSpec>,
    /// Exit code returned by `run` for the given action.
    pub failing_action: Option<(String, i32)>,
    pub on_run: Option<RunHook>,
}

/// In-memory stand-in for podman: tracks images, records every command.
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub state: Rc<RefCell<EngineState>>,
}

/// Unqualified references land in `localhost/`, as podman does.
fn qualify(image: &str) -> String {
    let first = image.split('/').next().unwrap_or_default();
    if image.contains('/') && (first == "localhost" || first.contains('.') || first.contains(':')) {
        image.to_string()
    } else {
        format!("localhost/{image}")
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_image(self, image: &str) -> Self {
        self.state.borrow_mut().images.insert(qualify(image));
        self
    }

    pub fn with_remote_image(self, image: &str) -> Self {
        self.state.borrow_mut().remote.insert(image.to_string());
        self
    }

    pub fn failing_action(self, action: &str, code: i32) -> Self {
        self.state.borrow_mut().failing_action = Some((action.to_string(), code));
        self
    }

    pub fn on_run(self, hook: impl FnMut(&CommandSpec) + 'static) -> Self {
        self.state.borrow_mut().on_run = Some(Box::new(hook));
        self
    }

    /// Whether `image` is in the local store.
    pub fn has_image(&self, image: &str) -> bool {
        self.state.borrow().images.contains(&qualify(image))
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.state.borrow().commands.clone()
    }

    /// Engine sub-commands (`inspect`, `run`, ...) with their arguments.
    pub fn engine_calls(&self) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|spec| spec.program == "podman")
            .map(|spec| spec.args)
            .collect()
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.engine_calls()
            .into_iter()
            .filter(|args| args[0] == "run")
            .collect()
    }

    pub fn verbs(&self) -> Vec<String> {
        self.engine_calls().into_iter().map(|args| args[0].clone()).collect()
    }
}

/// Value of `--env DTK_ACTION=...` in a run invocation.
pub fn run_action(args: &[String]) -> String {
    args.iter()
        .find_map(|arg| arg.strip_prefix("DTK_ACTION="))
        .unwrap_or_default()
        .to_string()
}

pub fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .collect()
}

impl CommandExecutor for FakeEngine {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        let mut state = self.state.borrow_mut();
        state.commands.push(spec.clone());
        if spec.program != "podman" {
            return Ok(CommandStatus::from_code(0));
        }

        let args = &spec.args;
        let code = match args[0].as_str() {
            "inspect" => {
                if state.images.contains(&qualify(&args[1])) {
                    0
                } else {
                    125
                }
            }
            "pull" => {
                if state.remote.contains(&args[1]) {
                    let image = qualify(&args[1]);
                    state.images.insert(image);
                    0
                } else {
                    125
                }
            }
            "import" => {
                let image = qualify(&args[2]);
                state.images.insert(image);
                0
            }
            "tag" => {
                if state.images.contains(&qualify(&args[1])) {
                    let image = qualify(&args[2]);
                    state.images.insert(image);
                    0
                } else {
                    125
                }
            }
            "commit" => {
                let image = qualify(&args[2]);
                state.images.insert(image);
                0
            }
            "run" => {
                if let Some(hook) = state.on_run.as_mut() {
                    hook(spec);
                }
                match &state.failing_action {
                    Some((action, code)) if run_action(args) == *action => *code,
                    _ => 0,
                }
            }
            _ => 0,
        };
        Ok(CommandStatus::from_code(code))
    }
}

pub fn out_dir(root: &Path, action: &str) -> PathBuf {
    root.join("out/demo/1.0/core").join(action)
}
