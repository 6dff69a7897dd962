use entity_workspace::{find_workspace_root, WorkspaceResolver};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn canonical(temp: &TempDir) -> std::path::PathBuf {
    fs::canonicalize(temp.path()).unwrap()
}

#[test]
fn members_glob_keeps_only_named_packages() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "package.json", r#"{"name":"root","workspaces":["packages/*"]}"#);
    write(&root, "packages/ui/package.json", r#"{"name":"@acme/ui"}"#);
    write(&root, "packages/ui/src/Button.tsx", "export const Button = () => null;");
    write(&root, "packages/core/package.json", r#"{"name":"@acme/core"}"#);
    write(&root, "packages/core/index.ts", "export const x = 1;");
    write(&root, "packages/scratch/notes.ts", "export {};");

    let workspace = WorkspaceResolver::discover(&root).unwrap();

    assert!(workspace.is_monorepo());
    let names: Vec<_> = workspace.packages().keys().cloned().collect();
    assert_eq!(names, vec!["@acme/core".to_string(), "@acme/ui".to_string()]);
    assert_eq!(
        workspace.package_path("@acme/ui").unwrap(),
        root.join("packages/ui").as_path()
    );
    assert_eq!(
        workspace.package_names_by_path().get(&root.join("packages/core")),
        Some(&"@acme/core".to_string())
    );
}

#[test]
fn pnpm_manifest_and_config_packages_are_filtered() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "pnpm-workspace.yaml", "packages:\n  - 'libs/*'\n  - 'tools/**'\n");
    write(&root, "libs/shared/package.json", r#"{"name":"shared"}"#);
    write(&root, "libs/shared/lib/index.js", "module.exports = {};");
    write(&root, "libs/lint/package.json", r#"{"name":"@acme/eslint-config"}"#);
    write(&root, "libs/lint/index.js", "module.exports = {};");
    write(&root, "tools/gen/cli/package.json", r#"{"name":"gen-cli"}"#);
    write(&root, "tools/gen/cli/main.ts", "export {};");
    write(&root, "tools/gen/node_modules/dep/package.json", r#"{"name":"dep"}"#);
    write(&root, "tools/gen/node_modules/dep/index.js", "");

    let workspace = WorkspaceResolver::discover(&root).unwrap();
    let names: Vec<_> = workspace.packages().keys().cloned().collect();
    assert_eq!(names, vec!["gen-cli".to_string(), "shared".to_string()]);
}

#[test]
fn recursive_pattern_includes_its_base_directory() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "package.json", r#"{"name":"root","workspaces":["tools/**"]}"#);
    write(&root, "tools/package.json", r#"{"name":"tooling"}"#);
    write(&root, "tools/index.ts", "export {};");
    write(&root, "tools/gen/package.json", r#"{"name":"gen"}"#);
    write(&root, "tools/gen/index.ts", "export {};");

    let workspace = WorkspaceResolver::discover(&root).unwrap();
    let names: Vec<_> = workspace.packages().keys().cloned().collect();
    assert_eq!(names, vec!["gen".to_string(), "tooling".to_string()]);
    assert_eq!(workspace.package_path("tooling"), Some(root.join("tools").as_path()));
}

#[test]
fn start_dir_without_manifest_is_single_package() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "app/package.json", r#"{"name":"solo"}"#);
    write(&root, "app/src/main.ts", "export {};");

    assert_eq!(find_workspace_root(&root.join("app")), None);
    let workspace = WorkspaceResolver::discover(root.join("app")).unwrap();
    assert!(!workspace.is_monorepo());
    assert_eq!(workspace.root(), root.join("app").as_path());
    assert_eq!(workspace.package_path("solo"), Some(root.join("app").as_path()));
}

#[test]
fn nested_start_finds_root_and_default_patterns() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "pnpm-workspace.yaml", "# no packages listed\n");
    write(&root, "apps/web/package.json", r#"{"name":"web","dependencies":{"kit":"workspace:*"}}"#);
    write(&root, "apps/web/src/main.ts", "export {};");
    write(&root, "modules/kit/package.json", r#"{"name":"kit"}"#);
    write(&root, "modules/kit/index.ts", "export {};");

    let workspace = WorkspaceResolver::discover(root.join("apps/web/src")).unwrap();
    assert_eq!(workspace.root(), root.as_path());
    assert!(workspace.package_path("web").is_some());
    assert!(workspace.package_path("kit").is_some());

    let info = workspace.workspace_info(&root.join("apps/web"));
    assert_eq!(info.packages.keys().cloned().collect::<Vec<_>>(), vec!["kit".to_string()]);
}

#[test]
fn injected_dependencies_build_reverse_map() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "package.json", r#"{"workspaces":{"packages":["packages/*"]}}"#);
    write(&root, "packages/base/package.json", r#"{"name":"base"}"#);
    write(&root, "packages/base/index.ts", "");
    write(
        &root,
        "packages/mid/package.json",
        r#"{"name":"mid","dependenciesMeta":{"base":{"injected":true}}}"#,
    );
    write(&root, "packages/mid/index.ts", "");
    write(
        &root,
        "packages/top/package.json",
        r#"{"name":"top","dependencies":{"mid":"workspace:^"}}"#,
    );
    write(&root, "packages/top/index.ts", "");

    let workspace = WorkspaceResolver::discover(&root).unwrap();
    let dependents = workspace.dependents();
    assert_eq!(dependents["base"].iter().cloned().collect::<Vec<_>>(), vec!["mid".to_string()]);
    assert!(dependents["top"].is_empty());

    let affected: Vec<_> = workspace.affected_by("base").into_iter().collect();
    assert_eq!(affected, vec!["mid".to_string(), "top".to_string()]);
}

#[test]
fn pnpm_store_paths_normalize_into_packages() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "package.json", r#"{"workspaces":["packages/*"]}"#);
    write(&root, "packages/ui/package.json", r#"{"name":"@acme/ui"}"#);
    write(&root, "packages/ui/src/index.ts", "");

    let workspace = WorkspaceResolver::discover(&root).unwrap();
    let linked = root.join("node_modules/.pnpm/file+packages+ui/node_modules/@acme/ui/src/index.ts");
    assert_eq!(
        workspace.normalize_path(&linked),
        root.join("packages/ui").join("src/index.ts")
    );

    let hoisted = root.join("node_modules/@acme/ui/src/index.ts");
    assert_eq!(
        workspace.normalize_path(&hoisted),
        root.join("packages/ui").join("src/index.ts")
    );

    let untouched = root.join("src/app.ts");
    assert_eq!(workspace.normalize_path(&untouched), untouched);
}

#[test]
fn pnpm_store_folder_resolves_linked_dependency() {
    let temp = TempDir::new().expect("tempdir");
    let root = canonical(&temp);
    write(&root, "pnpm-workspace.yaml", "packages:\n  - 'apps/*'\n");
    write(
        &root,
        "apps/web/package.json",
        r#"{"name":"web","dependenciesMeta":{"@acme/icons":{"injected":true}}}"#,
    );
    write(&root, "apps/web/index.ts", "");
    write(&root, "packages/design/icons/package.json", r#"{"name":"@acme/icons"}"#);
    write(&root, "packages/design/icons/index.ts", "");
    fs::create_dir_all(root.join("node_modules/.pnpm/file+packages+design+icons")).unwrap();

    let workspace = WorkspaceResolver::discover(root.join("apps/web")).unwrap();
    let info = workspace.workspace_info(&root.join("apps/web"));
    assert_eq!(
        info.packages.get("@acme/icons"),
        Some(&root.join("packages").join("design").join("icons"))
    );
}
