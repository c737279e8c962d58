//! Recipe files: the declaration a run is built from
//!
//! TOML or JSON (by extension). Resources are listed in execution order;
//! notification edges are given inline (`notifies`) or in a top-level
//! `notifications` list.
//!
//! ```toml
//! name = "webserver"
//!
//! [variables]
//! app_port = "3000"
//!
//! [[resources]]
//! id = "install-nginx"
//! kind = "package"
//! name = "nginx"
//!
//! [[resources]]
//! id = "write-config"
//! kind = "file"
//! path = "/etc/nginx/sites-available/default"
//! source = "templates/default.conf"
//! mode = "0644"
//! notifies = [{ target = "restart-nginx", action = "restart" }]
//!
//! [[resources]]
//! id = "restart-nginx"
//! kind = "service"
//! name = "nginx"
//! running = true
//! enabled = true
//! ```

use anyhow::{Context, Result, bail};
use declarative::{Condition, Guard, NotificationEdge, NotifyAction, Run, Step, Template, Variables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::resource::directory::Directory;
use crate::resource::exec::Exec;
use crate::resource::file::File;
use crate::resource::ownership::Ownership;
use crate::resource::package::Package;
use crate::resource::service::Service;
use crate::resource::{Host, Resource};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    #[serde(default)]
    pub notifications: Vec<NotificationEdge>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Unique id; defaults to the package/service name or the path
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub spec: ResourceSpec,
    #[serde(default)]
    pub only_if: Option<Condition>,
    #[serde(default)]
    pub not_if: Option<Condition>,
    #[serde(default)]
    pub ignore_failure: bool,
    #[serde(default)]
    pub notifies: Vec<Notifies>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notifies {
    pub target: String,
    pub action: NotifyAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceSpec {
    #[serde(alias = "apt_package")]
    Package {
        name: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        options: Vec<String>,
    },
    #[serde(alias = "template")]
    File {
        path: String,
        /// Literal content
        #[serde(default)]
        content: Option<String>,
        /// Inline template
        #[serde(default)]
        template: Option<String>,
        /// Template file, relative to the recipe
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        owner: Option<String>,
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        mode: Option<String>,
    },
    Directory {
        path: String,
        #[serde(default)]
        recursive: bool,
        #[serde(default)]
        owner: Option<String>,
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        mode: Option<String>,
    },
    Service {
        name: String,
        #[serde(default)]
        running: Option<bool>,
        #[serde(default)]
        enabled: Option<bool>,
    },
    #[serde(alias = "execute", alias = "bash")]
    Exec {
        command: String,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        environment: BTreeMap<String, String>,
        #[serde(default)]
        creates: Option<String>,
    },
}

impl ResourceDecl {
    /// Declared id, or the natural key of the resource
    pub fn id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }
        match &self.spec {
            ResourceSpec::Package { name, .. } | ResourceSpec::Service { name, .. } => {
                Some(name.clone())
            }
            ResourceSpec::File { path, .. } | ResourceSpec::Directory { path, .. } => {
                Some(path.clone())
            }
            ResourceSpec::Exec { .. } => None,
        }
    }
}

impl Recipe {
    /// Load a recipe; `.json` files are JSON, anything else TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read recipe {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut recipe: Self = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid recipe {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid recipe {}", path.display()))?
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        recipe.base_dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir.to_path_buf()
        };
        if recipe.name.is_none() {
            recipe.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(recipe)
    }

    /// Display name: declared name or the recipe file stem
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("recipe")
    }

    /// Variables for rendering: `base`, then the recipe's own, then `overrides`
    pub fn variables(&self, base: &Variables, overrides: &Variables) -> Variables {
        let mut vars = host_variables();
        vars.extend(base.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }

    /// Build the run: resources in declaration order, guards, failure
    /// policies and notification edges
    pub fn build(&self, host: &Host, vars: &Variables) -> Result<Run> {
        let mut run = Run::new();

        for (index, decl) in self.resources.iter().enumerate() {
            let id = decl
                .id()
                .with_context(|| format!("Resource #{} ({}) needs an id", index + 1, kind_name(&decl.spec)))?;
            let resource = self
                .instantiate(&id, &decl.spec, host, vars)
                .with_context(|| format!("Invalid resource '{id}'"))?;

            let mut step = Step::new(resource);
            if let Some(cond) = &decl.only_if {
                step = step.with_guard(Guard::OnlyIf(self.expand_condition(cond)));
            }
            if let Some(cond) = &decl.not_if {
                step = step.with_guard(Guard::NotIf(self.expand_condition(cond)));
            }
            if decl.ignore_failure {
                step = step.ignore_failure();
            }
            run.add(step)?;
        }

        for decl in &self.resources {
            let Some(from) = decl.id() else { continue };
            for n in &decl.notifies {
                run.notify(&from, &n.target, n.action)?;
            }
        }
        for edge in &self.notifications {
            run.notify(&edge.from, &edge.to, edge.action)?;
        }

        Ok(run)
    }

    fn instantiate(
        &self,
        id: &str,
        spec: &ResourceSpec,
        host: &Host,
        vars: &Variables,
    ) -> Result<Box<dyn Resource>> {
        Ok(match spec {
            ResourceSpec::Package {
                name,
                version,
                options,
            } => {
                let mut package = aptkit::Package::new(name).with_options(options.clone());
                package.version.clone_from(version);
                Box::new(Package::new(id, package, host.packages.clone()))
            }
            ResourceSpec::File {
                path,
                content,
                template,
                source,
                owner,
                group,
                mode,
            } => {
                let content = self.file_content(content, template, source, vars)?;
                let ownership = Ownership::new(owner.clone(), group.clone(), mode.as_deref())?;
                Box::new(
                    File::new(id, paths::resolve(&self.base_dir, path), content)
                        .with_ownership(ownership),
                )
            }
            ResourceSpec::Directory {
                path,
                recursive,
                owner,
                group,
                mode,
            } => {
                let ownership = Ownership::new(owner.clone(), group.clone(), mode.as_deref())?;
                Box::new(
                    Directory::new(id, paths::resolve(&self.base_dir, path))
                        .recursive(*recursive)
                        .with_ownership(ownership),
                )
            }
            ResourceSpec::Service {
                name,
                running,
                enabled,
            } => Box::new(
                Service::new(id, name, host.services.clone())
                    .running(*running)
                    .enabled(*enabled),
            ),
            ResourceSpec::Exec {
                command,
                cwd,
                user,
                group,
                environment,
                creates,
            } => {
                let mut exec = Exec::new(id, command);
                exec.cwd = cwd.as_deref().map(|p| paths::resolve(&self.base_dir, p));
                exec.user.clone_from(user);
                exec.group.clone_from(group);
                exec.environment.clone_from(environment);
                exec.creates = creates.as_deref().map(|p| paths::resolve(&self.base_dir, p));
                Box::new(exec)
            }
        })
    }

    fn file_content(
        &self,
        content: &Option<String>,
        template: &Option<String>,
        source: &Option<String>,
        vars: &Variables,
    ) -> Result<String> {
        match (content, template, source) {
            (Some(literal), None, None) => Ok(literal.clone()),
            (None, Some(inline), None) => Ok(Template::parse(inline)?.render(vars)?),
            (None, None, Some(source)) => {
                let path = paths::resolve(&self.base_dir, source);
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("Could not read template {}", path.display()))?;
                let rendered = Template::parse(&text)
                    .and_then(|t| t.render(vars))
                    .with_context(|| format!("Could not render {}", path.display()))?;
                Ok(rendered)
            }
            (None, None, None) => bail!("one of content, template or source is required"),
            _ => bail!("content, template and source are mutually exclusive"),
        }
    }

    fn expand_condition(&self, cond: &Condition) -> Condition {
        let resolve = |p: &Path| paths::resolve(&self.base_dir, &p.to_string_lossy());
        match cond {
            Condition::Exists { path } => Condition::Exists { path: resolve(path) },
            Condition::Missing { path } => Condition::Missing { path: resolve(path) },
            Condition::OlderThan { path, seconds } => Condition::OlderThan {
                path: resolve(path),
                seconds: *seconds,
            },
            Condition::All(cs) => Condition::All(cs.iter().map(|c| self.expand_condition(c)).collect()),
            Condition::Any(cs) => Condition::Any(cs.iter().map(|c| self.expand_condition(c)).collect()),
            Condition::Not(c) => Condition::Not(Box::new(self.expand_condition(c))),
        }
    }
}

fn kind_name(spec: &ResourceSpec) -> &'static str {
    match spec {
        ResourceSpec::Package { .. } => "package",
        ResourceSpec::File { .. } => "file",
        ResourceSpec::Directory { .. } => "directory",
        ResourceSpec::Service { .. } => "service",
        ResourceSpec::Exec { .. } => "exec",
    }
}

/// Facts about this machine, available to templates as `node.*`
fn host_variables() -> Variables {
    let mut vars = Variables::new();
    if let Some(name) = hostname() {
        vars.insert("node.hostname".to_string(), name);
    }
    vars
}

fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for buf.len() bytes; gethostname NUL-terminates
    // on success when the name fits
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&buf[..end]).ok().map(str::to_string)
}

/// Parse `key=value` pairs from the command line
pub fn parse_var(pair: &str) -> Result<(String, String), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty variable name in '{pair}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fakes::{FakeApt, FakeInit, host};
    use declarative::{ExecuteOptions, HostProbe, NoProgress, Phase, ResourceKind, Status, execute};
    use tempfile::TempDir;

    fn write_recipe(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn nginx_recipe(dir: &TempDir) -> Recipe {
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(
            dir.path().join("templates/default.conf"),
            "server {\n  listen 80;\n  location / { proxy_pass http://127.0.0.1:{{ app_port }}; }\n}\n",
        )
        .unwrap();
        let body = r#"
name = "webserver"

[variables]
app_port = "3000"

[[resources]]
id = "install-nginx"
kind = "package"
name = "nginx"

[[resources]]
id = "write-config"
kind = "template"
path = "etc/nginx/sites-available/default"
source = "templates/default.conf"
mode = "0644"
notifies = [{ target = "restart-nginx", action = "restart" }]

[[resources]]
kind = "file"
path = "etc/nginx/.htpasswd"
content = "admin:$apr1$x\n"

[[resources]]
id = "restart-nginx"
kind = "service"
name = "nginx"
running = true

[[notifications]]
from = "etc/nginx/.htpasswd"
to = "restart-nginx"
action = "restart"
"#;
        Recipe::load(&write_recipe(dir, "webserver.toml", body)).unwrap()
    }

    fn opts() -> ExecuteOptions {
        ExecuteOptions::default()
    }

    #[test]
    fn test_load_and_build() {
        let dir = TempDir::new().unwrap();
        let recipe = nginx_recipe(&dir);
        assert_eq!(recipe.display_name(), "webserver");

        let apt = FakeApt::new();
        let init = FakeInit::new();
        let vars = recipe.variables(&Variables::new(), &Variables::new());
        let run = recipe.build(&host(&apt, &init), &vars).unwrap();

        let ids: Vec<String> = run.steps().iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            vec![
                "install-nginx",
                "write-config",
                "etc/nginx/.htpasswd",
                "restart-nginx"
            ]
        );
        assert_eq!(run.edges().len(), 2);
        assert_eq!(run.steps()[1].resource.kind(), ResourceKind::File);
    }

    #[test]
    fn test_first_run_converges_and_restarts_once() {
        let dir = TempDir::new().unwrap();
        let recipe = nginx_recipe(&dir);
        let apt = FakeApt::new();
        let init = FakeInit::new();
        init.set("nginx", true, false);
        let vars = recipe.variables(&Variables::new(), &Variables::new());

        let run = recipe.build(&host(&apt, &init), &vars).unwrap();
        let report = execute(run, &opts(), &HostProbe, &mut NoProgress);

        assert!(report.is_success());
        let summary = report.summary();
        assert_eq!(summary.applied, 4);
        assert_eq!(apt.installs(), vec!["nginx"]);
        let rendered =
            fs::read_to_string(dir.path().join("etc/nginx/sites-available/default")).unwrap();
        assert!(rendered.contains("proxy_pass http://127.0.0.1:3000;"));

        // two changed files, one restart
        let restart = report.outcome("restart-nginx", Phase::Notification).unwrap();
        assert_eq!(restart.status, Status::Applied);
        assert_eq!(
            init.calls(),
            vec![("nginx".to_string(), svckit::Action::Restart)]
        );
    }

    #[test]
    fn test_second_run_is_all_skipped() {
        let dir = TempDir::new().unwrap();
        let recipe = nginx_recipe(&dir);
        let apt = FakeApt::new();
        let init = FakeInit::new();
        init.set("nginx", true, false);
        let vars = recipe.variables(&Variables::new(), &Variables::new());

        let first = recipe.build(&host(&apt, &init), &vars).unwrap();
        assert!(execute(first, &opts(), &HostProbe, &mut NoProgress).is_success());

        let second = recipe.build(&host(&apt, &init), &vars).unwrap();
        let report = execute(second, &opts(), &HostProbe, &mut NoProgress);
        let summary = report.summary();
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.skipped, 4);
        assert!(report.outcome("restart-nginx", Phase::Notification).is_none());
        assert_eq!(apt.installs().len(), 1);
        assert_eq!(init.calls().len(), 1);
    }

    #[test]
    fn test_cli_override_changes_content() {
        let dir = TempDir::new().unwrap();
        let recipe = nginx_recipe(&dir);
        let apt = FakeApt::new();
        let init = FakeInit::new();
        let overrides = Variables::from([("app_port".to_string(), "8080".to_string())]);
        let vars = recipe.variables(&Variables::new(), &overrides);
        let run = recipe.build(&host(&apt, &init), &vars).unwrap();
        execute(run, &opts(), &HostProbe, &mut NoProgress);
        let rendered =
            fs::read_to_string(dir.path().join("etc/nginx/sites-available/default")).unwrap();
        assert!(rendered.contains(":8080;"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_recipe(
            &dir,
            "dup.toml",
            r#"
[[resources]]
kind = "package"
name = "git"

[[resources]]
kind = "package"
name = "git"
"#,
        );
        let recipe = Recipe::load(&path).unwrap();
        let err = recipe
            .build(&host(&FakeApt::new(), &FakeInit::new()), &Variables::new())
            .unwrap_err();
        assert!(err.to_string().contains("git"));
    }

    #[test]
    fn test_unknown_notification_target_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_recipe(
            &dir,
            "bad.toml",
            r#"
[[resources]]
kind = "file"
path = "motd"
content = "hi"
notifies = [{ target = "nginx", action = "reload" }]
"#,
        );
        let recipe = Recipe::load(&path).unwrap();
        assert!(
            recipe
                .build(&host(&FakeApt::new(), &FakeInit::new()), &Variables::new())
                .is_err()
        );
    }

    #[test]
    fn test_restart_of_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_recipe(
            &dir,
            "bad.toml",
            r#"
[[resources]]
kind = "package"
name = "nginx"

[[resources]]
kind = "file"
path = "motd"
content = "hi"

[[notifications]]
from = "nginx"
to = "motd"
action = "restart"
"#,
        );
        let recipe = Recipe::load(&path).unwrap();
        assert!(
            recipe
                .build(&host(&FakeApt::new(), &FakeInit::new()), &Variables::new())
                .is_err()
        );
    }

    #[test]
    fn test_unbound_template_variable_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_recipe(
            &dir,
            "bad.toml",
            r#"
[[resources]]
kind = "file"
path = "hosts"
template = "127.0.0.1 {{ node.fqdn }}"
"#,
        );
        let recipe = Recipe::load(&path).unwrap();
        let err = recipe
            .build(&host(&FakeApt::new(), &FakeInit::new()), &Variables::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("node.fqdn"));
    }

    #[test]
    fn test_exec_needs_id() {
        let dir = TempDir::new().unwrap();
        let path = write_recipe(
            &dir,
            "bad.toml",
            "[[resources]]\nkind = \"execute\"\ncommand = \"true\"\n",
        );
        let recipe = Recipe::load(&path).unwrap();
        let err = recipe
            .build(&host(&FakeApt::new(), &FakeInit::new()), &Variables::new())
            .unwrap_err();
        assert!(err.to_string().contains("needs an id"));
    }

    #[test]
    fn test_guards_and_ignore_failure_from_json() {
        let dir = TempDir::new().unwrap();
        let path = write_recipe(
            &dir,
            "node.json",
            r#"{
  "resources": [
    {
      "id": "apt-update",
      "kind": "exec",
      "command": "exit 1",
      "ignore_failure": true,
      "only_if": { "not": { "exists": { "path": "stamp" } } }
    },
    {
      "id": "install-node",
      "kind": "bash",
      "command": "touch installed",
      "cwd": ".",
      "not_if": { "exists": { "path": "installed" } }
    }
  ]
}"#,
        );
        let recipe = Recipe::load(&path).unwrap();
        let build = || {
            recipe
                .build(&host(&FakeApt::new(), &FakeInit::new()), &Variables::new())
                .unwrap()
        };

        let report = execute(build(), &opts(), &HostProbe, &mut NoProgress);
        assert!(report.is_success());
        let update = report.outcome("apt-update", Phase::Primary).unwrap();
        assert_eq!(update.status, Status::Failed);
        assert!(update.ignored);
        assert_eq!(
            report.outcome("install-node", Phase::Primary).unwrap().status,
            Status::Applied
        );

        let report = execute(build(), &opts(), &HostProbe, &mut NoProgress);
        let node = report.outcome("install-node", Phase::Primary).unwrap();
        assert_eq!(node.status, Status::Skipped);
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("app_port=3000").unwrap(),
            ("app_port".to_string(), "3000".to_string())
        );
        assert_eq!(parse_var("url=a=b").unwrap().1, "a=b");
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_variable_precedence() {
        let recipe = Recipe {
            variables: BTreeMap::from([("a".to_string(), "recipe".to_string())]),
            ..Recipe::default()
        };
        let base = Variables::from([
            ("a".to_string(), "settings".to_string()),
            ("b".to_string(), "settings".to_string()),
        ]);
        let vars = recipe.variables(&base, &Variables::new());
        assert_eq!(vars["a"], "recipe");
        assert_eq!(vars["b"], "settings");
    }
}
