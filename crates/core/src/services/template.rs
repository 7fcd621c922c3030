//! Notification template service.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use courier_common::{AppError, AppResult, TtlCache, id::IdGenerator};
use courier_db::entities::notification_template::{self, TemplateType};
use courier_db::repositories::TemplateRepository;
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// How long a template read stays cached.
const TEMPLATE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Placeholder syntax: `{{name}}`, surrounding whitespace ignored.
static VAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

/// Input for creating a template.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub template_type: TemplateType,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub subject_template: Option<String>,
    pub title_template: Option<String>,
    #[validate(length(min = 1))]
    pub content_template: String,
    pub html_template: Option<String>,
    pub sms_template: Option<String>,
    pub push_template: Option<String>,
    pub variables: Option<serde_json::Value>,
    pub sample_data: Option<serde_json::Value>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_language")]
    pub language: String,
    pub category: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Input for updating a template. `None` leaves a field unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateInput {
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub subject_template: Option<Option<String>>,
    pub title_template: Option<Option<String>>,
    #[validate(length(min = 1))]
    pub content_template: Option<String>,
    pub html_template: Option<Option<String>>,
    pub sms_template: Option<Option<String>>,
    pub push_template: Option<Option<String>>,
    pub variables: Option<serde_json::Value>,
    pub sample_data: Option<serde_json::Value>,
    pub category: Option<String>,
}

/// Service for managing and rendering notification templates.
#[derive(Clone)]
pub struct TemplateService {
    template_repo: TemplateRepository,
    cache: TtlCache<String, notification_template::Model>,
    id_gen: IdGenerator,
}

impl TemplateService {
    /// Create a new template service.
    #[must_use]
    pub fn new(template_repo: TemplateRepository) -> Self {
        Self {
            template_repo,
            cache: TtlCache::new(TEMPLATE_CACHE_TTL),
            id_gen: IdGenerator::new(),
        }
    }

    /// Render `{{name}}` placeholders in `text` against `vars`.
    ///
    /// Unknown placeholders are left intact so a half-filled render is
    /// visible rather than silently blanked.
    #[must_use]
    pub fn render(text: &str, vars: &HashMap<String, String>) -> String {
        VAR_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let name = caps[1].trim();
                vars.get(name)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Extract placeholder names from a template body, in order of first
    /// appearance.
    #[must_use]
    pub fn extract_variables(text: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for caps in VAR_RE.captures_iter(text) {
            let name = caps[1].trim().to_string();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// Get a template by ID, going through the read cache.
    pub async fn get_by_id(&self, id: &str) -> AppResult<notification_template::Model> {
        if let Some(cached) = self.cache.get(&id.to_string()).await {
            return Ok(cached);
        }

        let template = self.template_repo.get_by_id(id).await?;
        self.cache.insert(id.to_string(), template.clone()).await;
        Ok(template)
    }

    /// Get a template by ID, requiring it to be active.
    pub async fn get_active(&self, id: &str) -> AppResult<notification_template::Model> {
        let template = self.get_by_id(id).await?;
        if !template.is_active {
            return Err(AppError::InvalidState(format!(
                "Template {id} is not active"
            )));
        }
        Ok(template)
    }

    /// Find a template by name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<notification_template::Model>> {
        self.template_repo.find_by_name(name).await
    }

    /// List templates.
    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification_template::Model>> {
        self.template_repo.list(limit, offset).await
    }

    /// List active templates of a given type.
    pub async fn list_active_by_type(
        &self,
        template_type: TemplateType,
    ) -> AppResult<Vec<notification_template::Model>> {
        self.template_repo.find_active_by_type(template_type).await
    }

    /// Find the active default template for a (type, language) pair.
    pub async fn find_default(
        &self,
        template_type: TemplateType,
        language: &str,
    ) -> AppResult<Option<notification_template::Model>> {
        self.template_repo.find_default(template_type, language).await
    }

    /// Create a new template.
    pub async fn create(
        &self,
        input: CreateTemplateInput,
    ) -> AppResult<notification_template::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.template_repo.exists_by_name(&input.name).await? {
            return Err(AppError::Duplicate(format!(
                "A template named '{}' already exists",
                input.name
            )));
        }

        if input.is_default {
            self.template_repo
                .unset_default(input.template_type, &input.language)
                .await?;
        }

        let model = notification_template::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            template_type: Set(input.template_type),
            description: Set(input.description),
            subject_template: Set(input.subject_template),
            title_template: Set(input.title_template),
            content_template: Set(input.content_template),
            html_template: Set(input.html_template),
            sms_template: Set(input.sms_template),
            push_template: Set(input.push_template),
            variables: Set(input.variables),
            sample_data: Set(input.sample_data),
            is_active: Set(true),
            is_default: Set(input.is_default),
            version: Set(1),
            language: Set(input.language),
            category: Set(input.category),
            usage_count: Set(0),
            last_used_at: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.template_repo.create(model).await
    }

    /// Update a template. Every edit bumps `version`.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateTemplateInput,
    ) -> AppResult<notification_template::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let template = self.template_repo.get_by_id(id).await?;
        let version = template.version + 1;
        let mut active: notification_template::ActiveModel = template.into();

        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(subject_template) = input.subject_template {
            active.subject_template = Set(subject_template);
        }
        if let Some(title_template) = input.title_template {
            active.title_template = Set(title_template);
        }
        if let Some(content_template) = input.content_template {
            active.content_template = Set(content_template);
        }
        if let Some(html_template) = input.html_template {
            active.html_template = Set(html_template);
        }
        if let Some(sms_template) = input.sms_template {
            active.sms_template = Set(sms_template);
        }
        if let Some(push_template) = input.push_template {
            active.push_template = Set(push_template);
        }
        if let Some(variables) = input.variables {
            active.variables = Set(Some(variables));
        }
        if let Some(sample_data) = input.sample_data {
            active.sample_data = Set(Some(sample_data));
        }
        if let Some(category) = input.category {
            active.category = Set(Some(category));
        }

        active.version = Set(version);
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.template_repo.update(active).await?;
        self.cache.invalidate(&id.to_string()).await;
        Ok(updated)
    }

    /// Activate a template.
    pub async fn activate(&self, id: &str) -> AppResult<notification_template::Model> {
        self.set_active(id, true).await
    }

    /// Deactivate a template. Sends referencing it start failing with
    /// an invalid-state error until it is reactivated.
    pub async fn deactivate(&self, id: &str) -> AppResult<notification_template::Model> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: &str, is_active: bool) -> AppResult<notification_template::Model> {
        let template = self.template_repo.get_by_id(id).await?;
        let mut active: notification_template::ActiveModel = template.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.template_repo.update(active).await?;
        self.cache.invalidate(&id.to_string()).await;
        Ok(updated)
    }

    /// Promote a template to the default for its (type, language) pair.
    pub async fn set_default(&self, id: &str) -> AppResult<notification_template::Model> {
        let template = self.template_repo.get_by_id(id).await?;

        self.template_repo
            .unset_default(template.template_type, &template.language)
            .await?;

        let mut active: notification_template::ActiveModel = template.into();
        active.is_default = Set(true);
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.template_repo.update(active).await?;
        // The displaced default may also be cached.
        self.cache.clear().await;
        Ok(updated)
    }

    /// Delete a template.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.template_repo.get_by_id(id).await?;
        self.template_repo.delete(id).await?;
        self.cache.invalidate(&id.to_string()).await;
        Ok(())
    }

    /// Record one application of a template.
    pub async fn record_usage(&self, id: &str) -> AppResult<()> {
        self.template_repo.record_usage(id).await
    }

    /// Render a template's bodies against sample or caller data, without
    /// touching usage counters.
    pub async fn preview(
        &self,
        id: &str,
        vars: &HashMap<String, String>,
    ) -> AppResult<HashMap<String, String>> {
        let template = self.get_by_id(id).await?;

        let mut rendered = HashMap::new();
        rendered.insert(
            "content".to_string(),
            Self::render(&template.content_template, vars),
        );
        if let Some(subject) = &template.subject_template {
            rendered.insert("subject".to_string(), Self::render(subject, vars));
        }
        if let Some(title) = &template.title_template {
            rendered.insert("title".to_string(), Self::render(title, vars));
        }
        if let Some(html) = &template.html_template {
            rendered.insert("html".to_string(), Self::render(html, vars));
        }
        if let Some(sms) = &template.sms_template {
            rendered.insert("sms".to_string(), Self::render(sms, vars));
        }
        if let Some(push) = &template.push_template {
            rendered.insert("push".to_string(), Self::render(push, vars));
        }
        Ok(rendered)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_template(id: &str, name: &str) -> notification_template::Model {
        notification_template::Model {
            id: id.to_string(),
            name: name.to_string(),
            template_type: TemplateType::Transactional,
            description: None,
            subject_template: Some("Hello {{name}}".to_string()),
            title_template: None,
            content_template: "Welcome, {{name}}! Your code is {{code}}.".to_string(),
            html_template: None,
            sms_template: None,
            push_template: None,
            variables: None,
            sample_data: None,
            is_active: true,
            is_default: false,
            version: 1,
            language: "en".to_string(),
            category: None,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_known_variables() {
        let out = TemplateService::render(
            "Welcome, {{name}}! Your code is {{code}}.",
            &vars(&[("name", "Ada"), ("code", "1234")]),
        );
        assert_eq!(out, "Welcome, Ada! Your code is 1234.");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders_intact() {
        let out = TemplateService::render("Hi {{name}}, see {{link}}", &vars(&[("name", "Ada")]));
        assert_eq!(out, "Hi Ada, see {{link}}");
    }

    #[test]
    fn test_render_trims_placeholder_whitespace() {
        let out = TemplateService::render("Hi {{ name }}", &vars(&[("name", "Ada")]));
        assert_eq!(out, "Hi Ada");
    }

    #[test]
    fn test_render_empty_value_renders_empty() {
        let out = TemplateService::render("[{{name}}]", &vars(&[("name", "")]));
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_extract_variables_ordered_and_deduplicated() {
        let found = TemplateService::extract_variables("{{a}} {{ b }} {{a}} {{c}}");
        assert_eq!(found, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_get_by_id_caches_reads() {
        let template = create_test_template("t1", "welcome");

        // Only one query result appended: the second read must hit the cache.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[template.clone()]])
                .into_connection(),
        );

        let service = TemplateService::new(TemplateRepository::new(db));

        let first = service.get_by_id("t1").await.unwrap();
        let second = service.get_by_id("t1").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_get_active_rejects_inactive() {
        let mut template = create_test_template("t1", "welcome");
        template.is_active = false;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[template]])
                .into_connection(),
        );

        let service = TemplateService::new(TemplateRepository::new(db));

        let result = service.get_active("t1").await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1)),
                }]])
                .into_connection(),
        );

        let service = TemplateService::new(TemplateRepository::new(db));

        let input = CreateTemplateInput {
            name: "welcome".to_string(),
            template_type: TemplateType::Transactional,
            description: None,
            subject_template: None,
            title_template: None,
            content_template: "Hello".to_string(),
            html_template: None,
            sms_template: None,
            push_template: None,
            variables: None,
            sample_data: None,
            is_default: false,
            language: "en".to_string(),
            category: None,
        };

        let result = service.create(input).await;
        assert!(matches!(result, Err(AppError::Duplicate(_))));
    }
}
