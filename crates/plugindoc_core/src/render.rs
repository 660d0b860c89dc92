use serde::{Deserialize, Serialize};

use crate::descriptor::{GoalDescriptor, ParameterDescriptor, PluginDescriptor};
use crate::markup::{Inline, MarkupDocument};

/// Human-readable strings used by the renderer. Overridable from the
/// `[messages]` config table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Messages {
    pub no_description: String,
    pub coordinates_label: String,
    pub goal_prefix_label: String,
    pub goals_heading: String,
    pub goals_intro: String,
    pub no_goals: String,
    pub goal_column: String,
    pub description_column: String,
    pub goal_of_label: String,
    pub parameters_heading: String,
    pub no_parameters: String,
    pub name_column: String,
    pub type_column: String,
    pub required_column: String,
    pub default_column: String,
    pub yes: String,
    pub no: String,
    pub no_default: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            no_description: "No description.".to_string(),
            coordinates_label: "Coordinates: ".to_string(),
            goal_prefix_label: ", goal prefix: ".to_string(),
            goals_heading: "Goals".to_string(),
            goals_intro: "Goals available for this plugin:".to_string(),
            no_goals: "This plugin has no goals.".to_string(),
            goal_column: "Goal".to_string(),
            description_column: "Description".to_string(),
            goal_of_label: "Goal of ".to_string(),
            parameters_heading: "Parameters".to_string(),
            no_parameters: "This goal has no parameters.".to_string(),
            name_column: "Name".to_string(),
            type_column: "Type".to_string(),
            required_column: "Required".to_string(),
            default_column: "Default".to_string(),
            yes: "Yes".to_string(),
            no: "No".to_string(),
            no_default: "-".to_string(),
        }
    }
}

/// Overview page: plugin identity plus a linked table of goals.
pub fn render_plugin(plugin: &PluginDescriptor, messages: &Messages) -> MarkupDocument {
    let mut doc = MarkupDocument::default();
    doc.heading(1, plugin.root_title());
    doc.paragraph(vec![description_or(&plugin.description, messages)]);
    doc.paragraph(vec![
        Inline::text(&messages.coordinates_label),
        Inline::code(plugin.coordinates()),
        Inline::text(&messages.goal_prefix_label),
        Inline::code(plugin.goal_prefix()),
    ]);
    doc.heading(2, &messages.goals_heading);

    if plugin.goals.is_empty() {
        doc.paragraph(vec![Inline::text(&messages.no_goals)]);
        return doc;
    }

    doc.paragraph(vec![Inline::text(&messages.goals_intro)]);
    let rows = plugin
        .goals
        .iter()
        .map(|goal| {
            vec![
                vec![Inline::link(goal.canonical_title(), plugin.full_goal_name(goal))],
                vec![description_or(first_sentence(&goal.description), messages)],
            ]
        })
        .collect();
    doc.table(
        vec![
            messages.goal_column.clone(),
            messages.description_column.clone(),
        ],
        rows,
    );
    doc
}

/// Goal page: full goal name, description and the parameter table.
pub fn render_goal(
    plugin: &PluginDescriptor,
    goal: &GoalDescriptor,
    messages: &Messages,
) -> MarkupDocument {
    let mut doc = MarkupDocument::default();
    doc.heading(1, plugin.full_goal_name(goal));
    doc.paragraph(vec![description_or(&goal.description, messages)]);
    doc.paragraph(vec![
        Inline::text(&messages.goal_of_label),
        Inline::link(plugin.root_title(), plugin.root_title()),
    ]);
    doc.heading(2, &messages.parameters_heading);

    if goal.parameters.is_empty() {
        doc.paragraph(vec![Inline::text(&messages.no_parameters)]);
        return doc;
    }

    let rows = goal
        .parameters
        .iter()
        .map(|parameter| parameter_row(parameter, messages))
        .collect();
    doc.table(
        vec![
            messages.name_column.clone(),
            messages.type_column.clone(),
            messages.required_column.clone(),
            messages.default_column.clone(),
            messages.description_column.clone(),
        ],
        rows,
    );
    doc
}

fn parameter_row(parameter: &ParameterDescriptor, messages: &Messages) -> Vec<Vec<Inline>> {
    let required = if parameter.required {
        &messages.yes
    } else {
        &messages.no
    };
    let default = match parameter.default_value.as_deref() {
        Some(value) if !value.trim().is_empty() => Inline::code(value),
        _ => Inline::text(&messages.no_default),
    };
    vec![
        vec![Inline::code(&parameter.name)],
        vec![Inline::code(&parameter.value_type)],
        vec![Inline::text(required)],
        vec![default],
        vec![description_or(
            parameter.description.as_deref().unwrap_or_default(),
            messages,
        )],
    ]
}

fn description_or(description: &str, messages: &Messages) -> Inline {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        Inline::text(&messages.no_description)
    } else {
        Inline::text(trimmed)
    }
}

/// One-line summary used in the goal table.
fn first_sentence(description: &str) -> &str {
    let line = description.trim().lines().next().unwrap_or_default();
    match line.find(". ") {
        Some(end) => &line[..=end],
        None => line,
    }
}
