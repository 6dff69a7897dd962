use entity_extractor::{AnalysisContext, BaseEntity, EntityExtractor};
use entity_graph::{ReferenceGraph, ReferenceKind, StaticAnalyzer};
use entity_workspace::WorkspaceResolver;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

const USER_PAGE: &str = r#"<template>
  <div>
    <UserCard :id="id" />
    <el-table />
  </div>
</template>

<script setup lang="ts">
/** Shows one user */
import { fetchUser, userApi } from '@/api/user';
import * as utils from '../utils';
import { formatMoney } from '@acme/ui';
import dayjs from 'dayjs';

const emit = defineEmits(['saved']);
fetchUser('1');
userApi.get('2');
utils.clamp(3);
formatMoney(4);
dayjs();
emit('saved');
</script>
"#;

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "package.json", r#"{ "name": "acme", "private": true, "workspaces": ["packages/*", "apps/*"] }"#);

    write(root, "packages/ui/package.json", r#"{ "name": "@acme/ui", "main": "src/index.ts" }"#);
    write(
        root,
        "packages/ui/src/index.ts",
        "export { default as Button } from './Button';\nexport * from './format';\n",
    );
    write(
        root,
        "packages/ui/src/Button.tsx",
        "/** Primary button */\nexport default function Button(props) {\n  props.onPress();\n  return <button />;\n}\n",
    );
    write(
        root,
        "packages/ui/src/format.ts",
        "export function formatMoney(v: number) { return String(v); }\n",
    );

    write(
        root,
        "apps/web/package.json",
        r#"{ "name": "web", "dependencies": { "@acme/ui": "workspace:*" } }"#,
    );
    write(
        root,
        "apps/web/tsconfig.json",
        "{\n  // web app\n  \"compilerOptions\": { \"baseUrl\": \".\", \"paths\": { \"@/*\": [\"src/*\"] } },\n}\n",
    );
    write(
        root,
        "apps/web/src/api/user.ts",
        "export const userApi = { get: (id: string) => id };\n\nexport function fetchUser(id: string) {\n  return userApi.get(id);\n}\n",
    );
    write(
        root,
        "apps/web/src/utils/index.ts",
        "export const MAX_ROWS = 10;\nexport function clamp(v: number) { return Math.min(v, MAX_ROWS); }\n",
    );
    write(root, "apps/web/src/pages/UserPage.vue", USER_PAGE);
    write(
        root,
        "apps/web/src/App.tsx",
        "import { Button } from '@acme/ui';\nimport UserPage from '@/pages/UserPage.vue';\n\nexport default function App() {\n  return <Layout><Button /><UserPage /></Layout>;\n}\n",
    );
    dir
}

fn analyzer(dir: &TempDir) -> (StaticAnalyzer, Vec<BaseEntity>) {
    let workspace = Arc::new(WorkspaceResolver::discover(dir.path().join("apps/web")).unwrap());
    let project = workspace.start().to_path_buf();
    let extractor = Arc::new(EntityExtractor::new(&project, Arc::new(AnalysisContext::new())));

    let mut entities = Vec::new();
    for rel in [
        "src/pages/UserPage.vue",
        "src/api/user.ts",
        "src/utils/index.ts",
        "src/App.tsx",
        "../../packages/ui/src/Button.tsx",
    ] {
        let path = entity_graph::clean_path(&project.join(rel));
        entities.extend(extractor.extract_file(&path).unwrap().iter().cloned());
    }

    let mut analyzer = StaticAnalyzer::for_workspace(workspace, extractor);
    analyzer.set_entities(&entities);
    (analyzer, entities)
}

fn by_id<'a>(entities: &'a [BaseEntity], id: &str) -> &'a BaseEntity {
    entities.iter().find(|e| e.id == id).unwrap()
}

#[test]
fn resolves_alias_namespace_and_workspace_references() {
    let dir = fixture();
    let (analyzer, entities) = analyzer(&dir);

    let page = analyzer.analyze_entity(by_id(&entities, "Component:UserPage")).unwrap();
    assert_eq!(
        page.imports,
        vec!["Function:fetchUser", "Function:formatMoney", "Variable:userApi"]
    );
    assert_eq!(
        page.calls,
        vec![
            "Function:clamp",
            "Function:fetchUser",
            "Function:formatMoney",
            "Variable:userApi.get",
        ]
    );
    assert_eq!(page.emits, vec!["saved"]);
    assert_eq!(page.template_components, vec!["UserCard", "el-table"]);
    assert_eq!(page.annotation, "Shows one user");
    assert_eq!(page.original_annotation, "/** Shows one user */");
}

#[test]
fn markup_modules_report_handlers_and_tags() {
    let dir = fixture();
    let (analyzer, entities) = analyzer(&dir);

    let app = analyzer.analyze_entity(by_id(&entities, "Component:App")).unwrap();
    assert_eq!(app.imports, vec!["Component:Button", "Component:UserPage"]);
    assert_eq!(app.template_components, vec!["Button", "Layout", "UserPage"]);
    assert!(app.annotation.is_empty());

    let button = entities.iter().find(|e| e.file.ends_with("Button.tsx")).unwrap();
    assert!(button.file.starts_with("../../packages/ui/"));
    let analysis = analyzer.analyze_entity(button).unwrap();
    assert_eq!(analysis.emits, vec!["press"]);
    assert_eq!(analysis.annotation, "Primary button");
}

#[test]
fn analysis_is_deterministic_and_feeds_the_graph() {
    let dir = fixture();
    let (analyzer, entities) = analyzer(&dir);

    let first: Vec<_> = entities.iter().map(|e| analyzer.analyze_entity(e).unwrap()).collect();
    analyzer.clear_references();
    let second: Vec<_> = entities.iter().map(|e| analyzer.analyze_entity(e).unwrap()).collect();
    assert_eq!(first, second);

    let graph = ReferenceGraph::from_analyses(entities.iter().zip(first.iter()));
    let dependents = graph.dependents("Function:fetchUser").unwrap();
    assert!(dependents.contains(&("Component:UserPage".to_string(), ReferenceKind::Imports)));
    assert!(dependents.contains(&("Component:UserPage".to_string(), ReferenceKind::Calls)));
    assert_eq!(graph.emitters("saved"), vec!["Component:UserPage".to_string()]);
}

#[test]
fn missing_file_is_an_error() {
    let dir = fixture();
    let (analyzer, entities) = analyzer(&dir);
    let mut gone = by_id(&entities, "Function:fetchUser").clone();
    gone.file = "src/api/removed.ts".to_string();
    assert!(analyzer.analyze_entity(&gone).is_err());
}
