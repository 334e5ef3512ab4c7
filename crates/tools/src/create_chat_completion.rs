//! Structured completions: derive a parameter schema from a declared
//! response shape, and pull the typed answer back out of the model's reply.
//!
//! The generated schema always has a single `response` property under an
//! object type, except for records, whose own fields become the properties.
//!
//! ```text
//! ResponseShape::Integer
//!   → {"type":"object",
//!      "properties":{"response":{"type":"integer","description":"Response of type integer"}},
//!      "required":["response"]}
//! ```
//!
//! Neither direction fails: unmapped types fall back to `"string"`, and a
//! reply that cannot be coerced to the declared primitive is returned raw.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolResult};
use tracing::debug;

pub const CREATE_CHAT_COMPLETION_TOOL_NAME: &str = "create_chat_completion";

const RESPONSE_FIELD: &str = "response";

/// The declared target shape of a structured completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    String,
    Integer,
    Float,
    Boolean,
    /// A primitive with no JSON mapping; rendered as `"string"`.
    Named(String),
    Record(RecordShape),
    Sequence(Box<ResponseShape>),
    Mapping(Box<ResponseShape>),
    Union(Vec<ResponseShape>),
}

impl ResponseShape {
    pub fn sequence_of(item: ResponseShape) -> Self {
        ResponseShape::Sequence(Box::new(item))
    }

    pub fn mapping_of(value: ResponseShape) -> Self {
        ResponseShape::Mapping(Box::new(value))
    }

    fn json_type(&self) -> &'static str {
        match self {
            ResponseShape::String => "string",
            ResponseShape::Integer => "integer",
            ResponseShape::Float => "number",
            ResponseShape::Boolean => "boolean",
            ResponseShape::Record(_) | ResponseShape::Mapping(_) => "object",
            ResponseShape::Sequence(_) => "array",
            ResponseShape::Named(name) => {
                debug!(type_name = %name, "No JSON type for response shape, using string");
                "string"
            }
            ResponseShape::Union(_) => "string",
        }
    }

    fn type_name(&self) -> String {
        match self {
            ResponseShape::String => "string".into(),
            ResponseShape::Integer => "integer".into(),
            ResponseShape::Float => "float".into(),
            ResponseShape::Boolean => "boolean".into(),
            ResponseShape::Named(name) => name.clone(),
            ResponseShape::Record(record) => record.title.clone(),
            ResponseShape::Sequence(item) => format!("list[{}]", item.type_name()),
            ResponseShape::Mapping(value) => format!("dict[str, {}]", value.type_name()),
            ResponseShape::Union(members) => members
                .iter()
                .map(ResponseShape::type_name)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    /// Schema for a shape nested inside another (list items, map values,
    /// union members, record fields).
    fn value_schema(&self) -> Value {
        match self {
            ResponseShape::Record(record) => record.json_schema(),
            ResponseShape::Sequence(item) => json!({
                "type": "array",
                "items": item.value_schema(),
            }),
            ResponseShape::Mapping(value) => json!({
                "type": "object",
                "additionalProperties": value.value_schema(),
            }),
            ResponseShape::Union(members) => json!({
                "anyOf": members.iter().map(ResponseShape::value_schema).collect::<Vec<_>>(),
            }),
            primitive => json!({
                "type": primitive.json_type(),
                "description": format!("Value of type {}", primitive.type_name()),
            }),
        }
    }
}

/// One named field of a [`RecordShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub shape: ResponseShape,
    pub description: Option<String>,
}

/// A structured record: named, typed fields plus its own required list.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    pub title: String,
    pub fields: Vec<RecordField>,
    pub required: Vec<String>,
}

impl RecordShape {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, shape: ResponseShape) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.fields.push(RecordField {
            name,
            shape,
            description: None,
        });
        self
    }

    /// Add a field the model may omit.
    pub fn optional_field(mut self, name: impl Into<String>, shape: ResponseShape) -> Self {
        self.fields.push(RecordField {
            name: name.into(),
            shape,
            description: None,
        });
        self
    }

    /// Attach a description to the most recently added field.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.description = Some(description.into());
        }
        self
    }

    fn properties(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| {
                let mut schema = field.shape.value_schema();
                if let (Some(description), Some(obj)) = (&field.description, schema.as_object_mut()) {
                    obj.insert("description".into(), Value::String(description.clone()));
                }
                (field.name.clone(), schema)
            })
            .collect()
    }

    pub fn json_schema(&self) -> Value {
        json!({
            "title": self.title,
            "type": "object",
            "properties": self.properties(),
            "required": self.required,
        })
    }
}

/// Tool that constrains the model's reply to a declared [`ResponseShape`].
pub struct CreateChatCompletion {
    shape: ResponseShape,
    required: Vec<String>,
    parameters: Value,
}

impl CreateChatCompletion {
    pub fn new(shape: ResponseShape) -> Self {
        let required = match &shape {
            ResponseShape::Record(record) if !record.required.is_empty() => record.required.clone(),
            _ => vec![RESPONSE_FIELD.to_string()],
        };
        let mut tool = Self {
            shape,
            required,
            parameters: Value::Null,
        };
        tool.parameters = tool.build_parameters();
        tool
    }

    /// Override the required field list negotiated with the model.
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self.parameters = self.build_parameters();
        self
    }

    pub fn shape(&self) -> &ResponseShape {
        &self.shape
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    fn build_parameters(&self) -> Value {
        if let ResponseShape::Record(record) = &self.shape {
            let required = if record.required.is_empty() {
                &self.required
            } else {
                &record.required
            };
            return json!({
                "type": "object",
                "properties": record.properties(),
                "required": required,
            });
        }

        let response = match &self.shape {
            ResponseShape::String => json!({
                "type": "string",
                "description": "The response text that should be delivered to the user.",
            }),
            ResponseShape::Sequence(item) => json!({
                "type": "array",
                "items": item.value_schema(),
            }),
            ResponseShape::Mapping(value) => json!({
                "type": "object",
                "additionalProperties": value.value_schema(),
            }),
            ResponseShape::Union(members) => json!({
                "anyOf": members.iter().map(ResponseShape::value_schema).collect::<Vec<_>>(),
            }),
            primitive => json!({
                "type": primitive.json_type(),
                "description": format!("Response of type {}", primitive.type_name()),
            }),
        };

        json!({
            "type": "object",
            "properties": { RESPONSE_FIELD: response },
            "required": self.required,
        })
    }

    /// Pull the answer out of the fields the model returned.
    ///
    /// `required` defaults to the list negotiated at construction. One
    /// required field yields its raw value, several yield an object of
    /// exactly those fields. Missing fields read as `""`.
    pub fn extract(&self, required: Option<&[String]>, raw_fields: &Map<String, Value>) -> Value {
        let fields = match required {
            Some(r) if !r.is_empty() => r,
            _ => self.required.as_slice(),
        };
        let read = |name: &str| {
            raw_fields
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()))
        };

        let value = match fields {
            [] => read(RESPONSE_FIELD),
            [single] => read(single.as_str()),
            many => {
                return Value::Object(many.iter().map(|name| (name.clone(), read(name.as_str()))).collect());
            }
        };

        self.coerce(value)
    }

    fn coerce(&self, value: Value) -> Value {
        let coerced = match &self.shape {
            ResponseShape::Integer => coerce_integer(&value),
            ResponseShape::Float => coerce_float(&value),
            ResponseShape::Boolean => coerce_boolean(&value),
            _ => return value,
        };

        coerced.unwrap_or_else(|| {
            debug!(
                shape = %self.shape.type_name(),
                value = %value,
                "Could not coerce structured response, returning raw value"
            );
            value
        })
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| Value::from(f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<Value> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    serde_json::Number::from_f64(parsed).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

#[async_trait]
impl Tool for CreateChatCompletion {
    fn name(&self) -> &str {
        CREATE_CHAT_COMPLETION_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Creates a structured completion with specified output formatting."
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let Value::Object(mut fields) = arguments else {
            return Err(ToolError::InvalidArguments(
                "structured completion arguments must be a JSON object".into(),
            ));
        };

        let required: Option<Vec<String>> = match fields.remove("required") {
            Some(Value::Array(names)) => Some(
                names
                    .into_iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        };

        let value = self.extract(required.as_deref(), &fields);
        let output = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(ToolResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn string_schema() {
        let tool = CreateChatCompletion::new(ResponseShape::String);
        let params = tool.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["response"]["type"], "string");
        assert_eq!(params["required"], json!(["response"]));
    }

    #[test]
    fn integer_schema() {
        let params = CreateChatCompletion::new(ResponseShape::Integer).parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["response"]["type"], "integer");
        assert_eq!(params["required"], json!(["response"]));
        assert_eq!(params["properties"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn float_maps_to_number() {
        let params = CreateChatCompletion::new(ResponseShape::Float).parameters();
        assert_eq!(params["properties"]["response"]["type"], "number");
    }

    #[test]
    fn unmapped_type_defaults_to_string() {
        let params = CreateChatCompletion::new(ResponseShape::Named("Decimal".into())).parameters();
        assert_eq!(params["properties"]["response"]["type"], "string");
        assert_eq!(params["properties"]["response"]["description"], "Response of type Decimal");
    }

    #[test]
    fn sequence_of_strings_schema() {
        let params =
            CreateChatCompletion::new(ResponseShape::sequence_of(ResponseShape::String)).parameters();
        let response = &params["properties"]["response"];
        assert_eq!(response["type"], "array");
        assert_eq!(response["items"]["type"], "string");
    }

    #[test]
    fn nested_sequence_derives_recursively() {
        let shape = ResponseShape::sequence_of(ResponseShape::sequence_of(ResponseShape::Integer));
        let params = CreateChatCompletion::new(shape).parameters();
        let items = &params["properties"]["response"]["items"];
        assert_eq!(items["type"], "array");
        assert_eq!(items["items"]["type"], "integer");
    }

    #[test]
    fn mapping_schema_uses_additional_properties() {
        let params =
            CreateChatCompletion::new(ResponseShape::mapping_of(ResponseShape::Boolean)).parameters();
        let response = &params["properties"]["response"];
        assert_eq!(response["type"], "object");
        assert_eq!(response["additionalProperties"]["type"], "boolean");
    }

    #[test]
    fn union_schema_lists_members() {
        let shape = ResponseShape::Union(vec![ResponseShape::Integer, ResponseShape::String]);
        let params = CreateChatCompletion::new(shape).parameters();
        let any_of = params["properties"]["response"]["anyOf"].as_array().unwrap();
        assert_eq!(any_of.len(), 2);
        assert_eq!(any_of[0]["type"], "integer");
        assert_eq!(any_of[1]["type"], "string");
    }

    #[test]
    fn record_schema_takes_precedence() {
        let record = RecordShape::new("User")
            .field("name", ResponseShape::String)
            .described("Full name")
            .field("age", ResponseShape::Integer)
            .optional_field("nickname", ResponseShape::String);
        let tool = CreateChatCompletion::new(ResponseShape::Record(record));
        let params = tool.parameters();

        assert_eq!(params["type"], "object");
        assert!(params["properties"].get("response").is_none());
        assert_eq!(params["properties"]["age"]["type"], "integer");
        assert_eq!(params["properties"]["name"]["description"], "Full name");
        assert_eq!(params["required"], json!(["name", "age"]));
        assert_eq!(tool.required(), ["name".to_string(), "age".to_string()]);
    }

    #[test]
    fn record_nested_in_sequence_uses_record_schema() {
        let record = RecordShape::new("Step").field("title", ResponseShape::String);
        let shape = ResponseShape::sequence_of(ResponseShape::Record(record));
        let params = CreateChatCompletion::new(shape).parameters();
        let items = &params["properties"]["response"]["items"];
        assert_eq!(items["title"], "Step");
        assert_eq!(items["properties"]["title"]["type"], "string");
    }

    #[test]
    fn with_required_overrides_default() {
        let tool = CreateChatCompletion::new(ResponseShape::String)
            .with_required(vec!["response".into(), "confidence".into()]);
        assert_eq!(tool.parameters()["required"], json!(["response", "confidence"]));
    }

    #[test]
    fn extract_multiple_fields_ignores_extras() {
        let tool = CreateChatCompletion::new(ResponseShape::String);
        let required = vec!["a".to_string(), "b".to_string()];
        let value = tool.extract(Some(&required), &fields(json!({"a": 1, "b": 2, "c": 3})));
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn extract_single_field_defaults_to_empty_text() {
        let tool = CreateChatCompletion::new(ResponseShape::String);
        assert_eq!(tool.extract(None, &Map::new()), json!(""));
        assert_eq!(
            tool.extract(None, &fields(json!({"response": "hello"}))),
            json!("hello")
        );
    }

    #[test]
    fn extract_coerces_integer() {
        let tool = CreateChatCompletion::new(ResponseShape::Integer);
        assert_eq!(tool.extract(None, &fields(json!({"response": "42"}))), json!(42));
        assert_eq!(tool.extract(None, &fields(json!({"response": 7}))), json!(7));
    }

    #[test]
    fn extract_keeps_raw_value_when_coercion_fails() {
        let tool = CreateChatCompletion::new(ResponseShape::Integer);
        assert_eq!(
            tool.extract(None, &fields(json!({"response": "forty-two"}))),
            json!("forty-two")
        );

        let tool = CreateChatCompletion::new(ResponseShape::Boolean);
        assert_eq!(
            tool.extract(None, &fields(json!({"response": "maybe"}))),
            json!("maybe")
        );
    }

    #[test]
    fn extract_coerces_float_and_boolean() {
        let tool = CreateChatCompletion::new(ResponseShape::Float);
        assert_eq!(tool.extract(None, &fields(json!({"response": "2.5"}))), json!(2.5));

        let tool = CreateChatCompletion::new(ResponseShape::Boolean);
        assert_eq!(tool.extract(None, &fields(json!({"response": "TRUE"}))), json!(true));
    }

    #[test]
    fn extract_record_returns_its_fields() {
        let record = RecordShape::new("User")
            .field("name", ResponseShape::String)
            .field("age", ResponseShape::Integer);
        let tool = CreateChatCompletion::new(ResponseShape::Record(record));
        let value = tool.extract(None, &fields(json!({"name": "Ada", "age": 36})));
        assert_eq!(value, json!({"name": "Ada", "age": 36}));
    }

    #[tokio::test]
    async fn execute_honours_required_argument() {
        let tool = CreateChatCompletion::new(ResponseShape::String);
        let result = tool
            .execute(json!({"required": ["a", "b"], "a": "x", "b": "y", "c": "z"}))
            .await
            .unwrap();
        let output: Value = serde_json::from_str(result.output.as_deref().unwrap()).unwrap();
        assert_eq!(output, json!({"a": "x", "b": "y"}));
    }

    #[tokio::test]
    async fn execute_renders_text_response() {
        let tool = CreateChatCompletion::new(ResponseShape::String);
        let result = tool.execute(json!({"response": "All done"})).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("All done"));
    }

    #[tokio::test]
    async fn execute_rejects_non_object_arguments() {
        let tool = CreateChatCompletion::new(ResponseShape::String);
        let err = tool.execute(json!(["response"])).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
