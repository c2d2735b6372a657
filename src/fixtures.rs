#[cfg(test)]
pub mod test {
    use serde_json::json;

    use crate::schema::{Condition, Field, FieldOption, FieldType, Schema};

    /// A small service template touching every value shape.
    pub fn service_schema() -> Schema {
        let mut env = Field::new("env", "Env", FieldType::Dropdown);
        env.mandatory = true;
        env.options = vec![
            FieldOption::Plain("DEV".into()),
            FieldOption::Plain("PROD".into()),
        ];

        let mut name = Field::new("name", "Name", FieldType::Text);
        name.required = true;

        let port = Field::new("port", "Port", FieldType::Number);
        let debug = Field::new("debug", "Debug", FieldType::Boolean);

        let mut tags = Field::new("tags", "Tags", FieldType::McqMultiple);
        tags.options = ["a", "b", "c"]
            .into_iter()
            .map(|o| FieldOption::Plain(o.into()))
            .collect();

        let mut labels = Field::new("labels", "Labels", FieldType::KeyValue);
        labels.initial_keys = vec!["team", "tier"].into();

        Schema::new(vec![env, name, port, debug, tags, labels])
    }

    /// Env-specific fields of each shape.
    pub fn env_schema() -> Schema {
        let mut endpoints = Field::new("endpoints", "Endpoints", FieldType::KeyValue);
        endpoints.environment_specific = true;
        endpoints.initial_keys = vec!["a", "b"].into();

        let mut regions = Field::new("regions", "Regions", FieldType::McqMultiple);
        regions.environment_specific = true;

        let mut host = Field::new("host", "Host", FieldType::Text);
        host.environment_specific = true;

        Schema::new(vec![endpoints, regions, host])
    }

    /// A field shown only in advanced mode, required only when tier is gold.
    pub fn conditional_schema() -> Schema {
        let mut mode = Field::new("mode", "Mode", FieldType::Dropdown);
        mode.options = vec![
            FieldOption::Labeled {
                label: Some("basic".into()),
                value: Some(json!("b")),
            },
            FieldOption::Labeled {
                label: Some("advanced".into()),
                value: Some(json!("a")),
            },
        ];
        let tier = Field::new("tier", "Tier", FieldType::Text);

        let mut threads = Field::new("threads", "Threads", FieldType::Number);
        threads.visible_if = Some(Condition::rule("mode", "advanced"));
        threads.mandatory_if = Some(Condition::rule("tier", "gold"));

        Schema::new(vec![mode, tier, threads])
    }

    #[test]
    fn fixtures_have_unique_keys() {
        for schema in [service_schema(), env_schema(), conditional_schema()] {
            schema.check_unique_keys().unwrap();
        }
    }
}
