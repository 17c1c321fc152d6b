//! Exact-match filter keywords: `incategory:`, `hastemplate:`, `linksto:`,
//! `inlanguage:`, `contentmodel:`, `filetype:`, `filemime:` and `pageid:`.
//!
//! The list-valued ones split the value on `|`, cap the list at the
//! configured condition limit (excess values are dropped with a warning,
//! never an error) and OR the surviving conditions together.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::{CompilationContext, WarningCollector};
use crate::query::Query;
use crate::resolve::TitleResolver;

use super::{resolver_miss, Delimiter, KeywordFeature, KeywordSpec, ParsedValue};

/// Category names plus raw `id:<n>` page ids, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryValue {
    pub names: Vec<String>,
    pub page_ids: Vec<u64>,
}

/// `incategory:A|B|id:12345` restricts hits to pages in any listed category.
pub struct InCategoryFeature {
    spec: KeywordSpec,
    max_conditions: usize,
    resolver: Arc<dyn TitleResolver>,
}

impl InCategoryFeature {
    pub fn new(max_conditions: usize, resolver: Arc<dyn TitleResolver>) -> Self {
        InCategoryFeature {
            spec: KeywordSpec::simple("incategory", &["incategory"]),
            max_conditions,
            resolver,
        }
    }
}

impl KeywordFeature for InCategoryFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let mut names = Vec::new();
        let mut page_ids = Vec::new();
        for part in capped(value, key, self.max_conditions, warnings) {
            if let Some(id) = part.strip_prefix("id:") {
                if let Ok(id) = id.parse::<u64>() {
                    page_ids.push(id);
                }
                continue;
            }
            let name = part.trim().replace('_', " ");
            if !name.is_empty() {
                names.push(name);
            }
        }
        Some(ParsedValue::Categories(CategoryValue { names, page_ids }))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Categories(value)) = parsed else {
            return (None, false);
        };
        let mut names = value.names.clone();
        for &page_id in &value.page_ids {
            match self.resolver.resolve_page_id(page_id) {
                Ok(resolved) => names.push(resolved.title),
                Err(err) => resolver_miss(ctx, err),
            }
        }
        if names.is_empty() {
            // every listed category failed to resolve, nothing can match
            ctx.add_warning("no-valid-categories", &[key]);
            ctx.disable_results();
            return (None, false);
        }
        let clauses = names
            .into_iter()
            .map(|name| Query::match_field("category.lowercase_keyword", name))
            .collect();
        (Some(Query::bool_or(clauses)), false)
    }
}

/// `hastemplate:Infobox|:Main_Page` filters on transcluded templates. Values
/// without an explicit namespace get the `Template:` prefix; a leading `:`
/// escapes into the main namespace.
pub struct HasTemplateFeature {
    spec: KeywordSpec,
    max_conditions: usize,
}

impl HasTemplateFeature {
    pub fn new(max_conditions: usize) -> Self {
        HasTemplateFeature {
            spec: KeywordSpec::simple("hastemplate", &["hastemplate"]),
            max_conditions,
        }
    }
}

impl KeywordFeature for HasTemplateFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let mut templates = Vec::new();
        for part in capped(value, key, self.max_conditions, warnings) {
            let name = part.trim().replace('_', " ");
            if name.is_empty() {
                continue;
            }
            let name = match name.strip_prefix(':') {
                Some(main_ns) => main_ns.to_string(),
                None if !name.contains(':') => format!("Template:{name}"),
                None => name,
            };
            templates.push(name);
        }
        Some(ParsedValue::Templates(templates))
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Templates(templates)) = parsed else {
            return (None, false);
        };
        if templates.is_empty() {
            return (None, false);
        }
        let clauses =
            templates.iter().map(|t| Query::match_field("template", t.clone())).collect();
        (Some(Query::bool_or(clauses)), false)
    }
}

/// OR-of-exact-terms over one field: `inlanguage:` and `contentmodel:`.
pub struct TermFilterFeature {
    spec: KeywordSpec,
    field: &'static str,
    max_conditions: usize,
}

impl TermFilterFeature {
    pub fn in_language(max_conditions: usize) -> Self {
        TermFilterFeature {
            spec: KeywordSpec::simple("inlanguage", &["inlanguage"]),
            field: "language",
            max_conditions,
        }
    }

    pub fn content_model(max_conditions: usize) -> Self {
        TermFilterFeature {
            spec: KeywordSpec::simple("contentmodel", &["contentmodel"]),
            field: "content_model",
            max_conditions,
        }
    }
}

impl KeywordFeature for TermFilterFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let terms = capped(value, key, self.max_conditions, warnings)
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Some(ParsedValue::Terms(terms))
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Terms(terms)) = parsed else {
            return (None, false);
        };
        if terms.is_empty() {
            return (None, false);
        }
        let clauses = terms.iter().map(|t| Query::term(self.field, t.clone())).collect();
        (Some(Query::bool_or(clauses)), false)
    }
}

/// `linksto:Page_title` filters on pages linking to the target. The link
/// index stores titles with underscores.
pub struct LinksToFeature {
    spec: KeywordSpec,
}

impl LinksToFeature {
    pub fn new() -> Self {
        LinksToFeature { spec: KeywordSpec::simple("linksto", &["linksto"]) }
    }
}

impl KeywordFeature for LinksToFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        _key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        _warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let target = value.trim().replace(' ', "_");
        if target.is_empty() {
            return None;
        }
        Some(ParsedValue::Text(target))
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Text(target)) = parsed else {
            return (None, false);
        };
        (Some(Query::match_field("outgoing_link", target.clone())), false)
    }
}

/// `filetype:` media types as the user typed them, plus the media types
/// their lowercased aliases expand to.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTypeValue {
    pub user_types: Vec<String>,
    pub aliased: Vec<String>,
}

/// `filetype:office|jpg` filters on the indexed media type. Aliases come
/// from configuration and add their target alongside the typed value.
pub struct FileTypeFeature {
    spec: KeywordSpec,
    max_conditions: usize,
    aliases: BTreeMap<String, String>,
}

impl FileTypeFeature {
    pub fn new(max_conditions: usize, aliases: BTreeMap<String, String>) -> Self {
        FileTypeFeature {
            spec: KeywordSpec::simple("filetype", &["filetype"]),
            max_conditions,
            aliases,
        }
    }
}

impl KeywordFeature for FileTypeFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let mut user_types = Vec::new();
        let mut aliased = Vec::new();
        for part in capped(value, key, self.max_conditions, warnings) {
            let media_type = part.trim();
            if media_type.is_empty() {
                continue;
            }
            if let Some(target) = self.aliases.get(&media_type.to_lowercase()) {
                aliased.push(target.clone());
            }
            user_types.push(media_type.to_string());
        }
        Some(ParsedValue::FileTypes(FileTypeValue { user_types, aliased }))
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::FileTypes(value)) = parsed else {
            return (None, false);
        };
        let clauses: Vec<Query> = value
            .aliased
            .iter()
            .chain(&value.user_types)
            .map(|t| Query::match_field("file_media_type", t.clone()))
            .collect();
        if clauses.is_empty() {
            return (None, false);
        }
        (Some(Query::bool_or(clauses)), false)
    }
}

/// Analyzed text filter over a single field, currently `filemime:`. A
/// quoted value matches as a phrase.
pub struct TextFieldFilterFeature {
    spec: KeywordSpec,
    field: &'static str,
}

impl TextFieldFilterFeature {
    pub fn file_mime() -> Self {
        TextFieldFilterFeature {
            spec: KeywordSpec::simple("filemime", &["filemime"]),
            field: "file_mime",
        }
    }
}

impl KeywordFeature for TextFieldFilterFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        _key: &str,
        value: &str,
        _quoted_value: &str,
        delimiter: Delimiter,
        _suffix: &str,
        _warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        if value.is_empty() {
            return None;
        }
        Some(ParsedValue::TextFilter {
            text: value.to_string(),
            phrase: delimiter == Delimiter::Quoted,
        })
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::TextFilter { text, phrase }) = parsed else {
            return (None, false);
        };
        let filter = if *phrase {
            Query::MatchPhrase { field: self.field.to_string(), query: text.clone() }
        } else {
            Query::match_field(self.field, text.clone())
        };
        (Some(filter), false)
    }
}

/// `pageid:1|2|3` restricts hits to explicitly listed page ids.
pub struct PageIdFeature {
    spec: KeywordSpec,
    max_conditions: usize,
}

impl PageIdFeature {
    pub fn new(max_conditions: usize) -> Self {
        PageIdFeature { spec: KeywordSpec::simple("pageid", &["pageid"]), max_conditions }
    }
}

impl KeywordFeature for PageIdFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let mut ids = Vec::new();
        let mut invalid = Vec::new();
        for part in capped(value, key, self.max_conditions, warnings) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.parse::<u64>() {
                Ok(id) => ids.push(id),
                Err(_) => invalid.push(part),
            }
        }
        if !invalid.is_empty() {
            let list = invalid.join(", ");
            warnings.add_warning("feature-pageid-invalid-id", &[&list]);
        }
        Some(ParsedValue::PageIds(ids))
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::PageIds(ids)) = parsed else {
            return (None, false);
        };
        if ids.is_empty() {
            return (None, false);
        }
        (Some(Query::Ids { values: ids.clone() }), false)
    }
}

/// Split a `|`-separated value and enforce the condition cap.
fn capped<'v>(
    value: &'v str,
    key: &str,
    max_conditions: usize,
    warnings: &mut dyn WarningCollector,
) -> Vec<&'v str> {
    let mut parts: Vec<&str> = value.split('|').collect();
    if parts.len() > max_conditions {
        warnings.add_warning(
            "feature-too-many-conditions",
            &[key, &max_conditions.to_string()],
        );
        parts.truncate(max_conditions);
    }
    parts
}
