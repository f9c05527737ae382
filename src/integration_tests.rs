//! End-to-end runs of the generation pipeline against the mock provider
//!
//! Every test works in its own temporary project directory holding a config,
//! one schema file, the state file and the output documents.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use serde_json::{Value, json};
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::detect::PendingReason;
    use crate::generator::{RunSummary, run_generation};
    use crate::history::load_history;
    use crate::output::output_file;
    use crate::provider::{LanguageModel, MockMode, MockProvider};
    use crate::state::StateStore;

    struct Project {
        dir: TempDir,
        config: Config,
    }

    impl Project {
        fn new(entities: Value) -> Self {
            Self::with_config(entities, json!({}))
        }

        fn with_config(entities: Value, extra: Value) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = json!({
                "schemaFiles": ["app.schema.json"],
                "outputDir": "locales",
                "sourceLanguage": "en"
            });
            if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
                base.extend(extra.clone());
            }
            let config = Config::from_value(dir.path(), &config).unwrap();
            let project = Self { dir, config };
            project.write_schema(entities);
            project
        }

        fn write_schema(&self, entities: Value) {
            let schema = json!({
                "sourceLanguage": "en",
                "targetLanguages": ["fr", "de"],
                "entities": entities
            });
            fs::write(self.dir.path().join("app.schema.json"), schema.to_string()).unwrap();
        }

        async fn run_with(&self, provider: &dyn LanguageModel, force: bool) -> RunSummary {
            let schemas = self.config.load_schemas().unwrap();
            run_generation(&self.config, &schemas, provider, force)
                .await
                .unwrap()
        }

        async fn run(&self) -> RunSummary {
            self.run_with(&MockProvider::new(MockMode::Suffix), false).await
        }

        fn output_path(&self, lang: &str) -> PathBuf {
            output_file(&self.config.output_dir, "app", lang)
        }

        fn raw_output(&self, lang: &str) -> String {
            fs::read_to_string(self.output_path(lang)).unwrap()
        }

        fn output(&self, lang: &str) -> Value {
            serde_json::from_str(&self.raw_output(lang)).unwrap()
        }

        fn state(&self) -> StateStore {
            StateStore::load(&self.config.state_path)
        }
    }

    fn greeting_only(description: &str) -> Value {
        json!({ "user": { "greeting": { "description": description } } })
    }

    fn app_entities() -> Value {
        json!({
            "user": {
                "_context": "Account screens",
                "greeting": { "description": "Hello, {name}!" },
                "farewell": { "description": "Goodbye" },
                "messages": { "description": "Unread messages", "pluralization": true }
            },
            "common": {
                "buttons": {
                    "save": { "description": "Save", "constraints": { "maxLength": 10 } }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_greeting_scenario() {
        let project = Project::new(greeting_only("Hello, {name}!"));

        let first = project.run().await;
        assert_eq!(first.pending, 2);
        assert_eq!(first.generated, 2);
        assert_eq!(
            project.output("fr"),
            json!({"user": {"greeting": "Hello, {name}!_fr"}})
        );
        assert_eq!(
            project.output("de"),
            json!({"user": {"greeting": "Hello, {name}!_de"}})
        );
        let state = project.state();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("app::user.greeting").unwrap().text_hashes.len(), 2);

        let fr_before = project.raw_output("fr");
        let provider = MockProvider::new(MockMode::Suffix);
        let second = project.run_with(&provider, false).await;
        assert!(second.is_up_to_date());
        assert_eq!(provider.batch_calls() + provider.translate_calls(), 0);
        assert_eq!(project.raw_output("fr"), fr_before);

        project.write_schema(greeting_only("Hi there, {name}!"));
        let third = project.run().await;
        assert_eq!(third.pending, 2);
        assert_eq!(third.reasons.get(&PendingReason::Changed), Some(&2));
        assert_eq!(
            project.output("de"),
            json!({"user": {"greeting": "Hi there, {name}!_de"}})
        );
        assert_eq!(project.state().stats().total_texts, 2);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let project = Project::new(app_entities());
        let first = project.run().await;
        assert_eq!(first.pending, 8);
        assert_eq!(first.failed, 0);
        assert_eq!(first.writes.files_written, 2);

        let outputs = (project.raw_output("fr"), project.raw_output("de"));
        let state_before = fs::read_to_string(&project.config.state_path).unwrap();

        let second = project.run().await;
        assert_eq!(second.pending, 0);
        assert_eq!(second.writes.files_written, 0);
        assert_eq!(second.writes.files_unchanged, 2);
        assert_eq!((project.raw_output("fr"), project.raw_output("de")), outputs);
        assert_eq!(fs::read_to_string(&project.config.state_path).unwrap(), state_before);
    }

    #[tokio::test]
    async fn test_description_change_only_regenerates_that_key() {
        let project = Project::new(app_entities());
        project.run().await;

        let mut entities = app_entities();
        entities["user"]["farewell"]["description"] = json!("See you soon");
        project.write_schema(entities);

        let summary = project.run().await;
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.reasons.get(&PendingReason::Changed), Some(&2));
        assert_eq!(project.output("fr")["user"]["farewell"], json!("See you soon_fr"));
        assert_eq!(project.output("fr")["user"]["greeting"], json!("Hello, {name}!_fr"));
    }

    #[tokio::test]
    async fn test_deleted_output_is_recovered_for_that_language_only() {
        let project = Project::new(app_entities());
        project.run().await;
        let fr_before = project.raw_output("fr");
        fs::remove_file(project.output_path("de")).unwrap();

        let summary = project.run().await;
        assert_eq!(summary.pending, 4);
        assert_eq!(summary.reasons.get(&PendingReason::Missing), Some(&4));
        assert_eq!(summary.by_language.keys().collect::<Vec<_>>(), vec!["de"]);
        assert_eq!(project.raw_output("fr"), fr_before);
        assert_eq!(project.output("de")["common"]["buttons"]["save"], json!("Save_de"));
    }

    #[tokio::test]
    async fn test_hand_added_keys_survive_regeneration() {
        let project = Project::new(app_entities());
        project.run().await;

        let mut fr = project.output("fr");
        fr["legacy"] = json!({"banner": "Ne pas toucher"});
        fr["user"]["nickname"] = json!("Surnom");
        fs::write(project.output_path("fr"), fr.to_string()).unwrap();

        project.run_with(&MockProvider::new(MockMode::Suffix), true).await;
        let fr = project.output("fr");
        assert_eq!(fr["legacy"]["banner"], json!("Ne pas toucher"));
        assert_eq!(fr["user"]["nickname"], json!("Surnom"));
        assert_eq!(fr["user"]["greeting"], json!("Hello, {name}!_fr"));
    }

    #[tokio::test]
    async fn test_failed_batches_fall_back_per_item() {
        let project = Project::new(app_entities());
        let provider = MockProvider::new(MockMode::Suffix)
            .failing_batches()
            .failing_text("Goodbye");

        let summary = project.run_with(&provider, false).await;
        assert_eq!(summary.fallbacks, summary.batches);
        assert_eq!(provider.translate_calls(), 8);
        assert_eq!(summary.generated, 6);
        assert_eq!(summary.failed, 2);
        assert!(project.output("fr")["user"].get("farewell").is_none());
        assert_eq!(project.output("fr")["user"]["greeting"], json!("Hello, {name}!_fr"));

        // Failed items stay pending and succeed once the provider recovers
        let retry = project.run().await;
        assert_eq!(retry.pending, 2);
        assert!(retry.by_language.values().all(|t| t.failed == 0));
        assert_eq!(project.output("de")["user"]["farewell"], json!("Goodbye_de"));
    }

    #[tokio::test]
    async fn test_plural_output_has_exactly_three_forms() {
        let project = Project::new(app_entities());
        let provider = MockProvider::new(MockMode::Suffix).with_extra_plural_form();
        project.run_with(&provider, false).await;

        let messages = project.output("fr")["user"]["messages"].clone();
        let keys: Vec<&String> = messages.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["=0", "=1", ">1"]);
        assert_eq!(messages[">1"], json!("Unread messages_fr_{count}"));
    }

    #[tokio::test]
    async fn test_removed_key_is_cleaned_up() {
        let project = Project::new(app_entities());
        project.run().await;

        let mut entities = app_entities();
        entities["user"].as_object_mut().unwrap().remove("farewell");
        entities.as_object_mut().unwrap().remove("common");
        project.write_schema(entities);

        let summary = project.run().await;
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.orphans_removed, 2);
        let state = project.state();
        assert!(state.get("app::user.farewell").is_none());
        assert!(state.get("app::common.buttons.save").is_none());
        assert!(state.has_text("app::user.greeting", "fr"));

        let fr = project.output("fr");
        assert!(fr["user"].get("farewell").is_none());
        assert!(fr.get("common").is_none());
        assert_eq!(fr["user"]["greeting"], json!("Hello, {name}!_fr"));
    }

    #[tokio::test]
    async fn test_leaf_turned_group_keeps_new_children() {
        let project = Project::new(json!({
            "user": { "settings": { "description": "Settings" } }
        }));
        project.run().await;
        assert_eq!(project.output("fr"), json!({"user": {"settings": "Settings_fr"}}));

        project.write_schema(json!({
            "user": { "settings": { "title": { "description": "Title" } } }
        }));
        let summary = project.run().await;
        assert_eq!(summary.orphans_removed, 1);
        assert_eq!(summary.generated, 2);
        assert_eq!(
            project.output("fr"),
            json!({"user": {"settings": {"title": "Title_fr"}}})
        );
        assert_eq!(project.output("de")["user"]["settings"]["title"], json!("Title_de"));

        let again = project.run().await;
        assert_eq!(again.pending, 0);
        assert_eq!(project.output("fr")["user"]["settings"]["title"], json!("Title_fr"));
    }

    #[tokio::test]
    async fn test_group_turned_leaf_replaces_old_children() {
        let project = Project::new(json!({
            "user": { "settings": { "title": { "description": "Title" } } }
        }));
        project.run().await;

        project.write_schema(json!({
            "user": { "settings": { "description": "Settings" } }
        }));
        project.run().await;
        assert_eq!(project.output("fr"), json!({"user": {"settings": "Settings_fr"}}));
    }

    #[tokio::test]
    async fn test_corrupt_state_regenerates_everything() {
        let project = Project::new(app_entities());
        project.run().await;
        fs::write(&project.config.state_path, "{ definitely not json").unwrap();

        let summary = project.run().await;
        assert_eq!(summary.pending, 8);
        assert_eq!(summary.reasons.get(&PendingReason::New), Some(&8));
        assert_eq!(project.state().stats().total_texts, 8);
    }

    #[tokio::test]
    async fn test_persona_change_invalidates_everything() {
        let project = Project::with_config(
            app_entities(),
            json!({"persona": {"role": "assistant", "tone": "formal"}}),
        );
        project.run().await;

        let changed = Project {
            config: Config {
                persona: Some(serde_json::from_value(json!({"role": "assistant", "tone": "playful"})).unwrap()),
                ..project.config.clone()
            },
            dir: project.dir,
        };
        let summary = changed.run().await;
        assert_eq!(summary.reasons.get(&PendingReason::Changed), Some(&8));
    }

    #[tokio::test]
    async fn test_max_batch_size_and_history() {
        let project = Project::with_config(
            app_entities(),
            json!({"maxBatchSize": 1, "historyPath": "history.json"}),
        );
        let summary = project.run().await;
        assert_eq!(summary.batches, 8);

        let history = load_history(&project.dir.path().join("history.json"));
        assert_eq!(history.len(), 2);
        let fr = &history["fr"][0];
        assert_eq!(fr.provider, "mock");
        assert_eq!(fr.keys_generated, 4);
        assert_eq!(fr.keys_updated, 0);
        assert_eq!(fr.tokens.total, 60);
        assert_eq!(fr.cost.total, 0.0);

        // Runs without work add no records
        project.run().await;
        assert_eq!(load_history(&project.dir.path().join("history.json"))["fr"].len(), 1);
    }
}
