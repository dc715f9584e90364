use crate::domain::model::{CommandKind, MAX_DURATION_MS, MAX_INTENSITY, MIN_DURATION_MS, MIN_INTENSITY};
use serde_json::{json, Value};

fn intensity_schema(description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": MIN_INTENSITY,
        "maximum": MAX_INTENSITY,
        "description": description,
    })
}

fn duration_schema() -> Value {
    json!({
        "type": "integer",
        "minimum": MIN_DURATION_MS,
        "maximum": MAX_DURATION_MS,
        "description": format!("Duration in milliseconds ({}-{})", MIN_DURATION_MS, MAX_DURATION_MS),
    })
}

fn id_schema() -> Value {
    json!({"type": "string", "description": "Shocker ID"})
}

/// MCP tool descriptor for one command kind.
pub fn tool_schema(kind: CommandKind) -> Value {
    let (description, properties, required) = match kind {
        CommandKind::Shock => (
            "Send shock command to OpenShock devices",
            json!({
                "id": id_schema(),
                "intensity": intensity_schema("Shock intensity (1-100), capped by the server limit"),
                "duration": duration_schema(),
            }),
            json!(["id", "intensity", "duration"]),
        ),
        CommandKind::Vibrate => (
            "Send vibrate command to OpenShock devices",
            json!({
                "id": id_schema(),
                "intensity": intensity_schema("Vibration intensity (1-100)"),
                "duration": duration_schema(),
            }),
            json!(["id", "intensity", "duration"]),
        ),
        CommandKind::Beep => (
            "Send beep/sound command to OpenShock devices",
            json!({
                "id": id_schema(),
                "intensity": intensity_schema("Beep intensity (1-100), defaults to 50"),
                "duration": duration_schema(),
            }),
            json!(["id", "duration"]),
        ),
        CommandKind::Stop => (
            "Stop all commands on OpenShock devices",
            json!({ "id": id_schema() }),
            json!(["id"]),
        ),
    };

    json!({
        "name": kind.as_str(),
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {
                "shockers": {
                    "type": "array",
                    "description": "List of shockers to control",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    }
                }
            },
            "required": ["shockers"]
        }
    })
}

pub fn all_tool_schemas() -> Vec<Value> {
    CommandKind::ALL.into_iter().map(tool_schema).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_a_tool() {
        let names: Vec<String> = all_tool_schemas()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["SHOCK", "VIBRATE", "BEEP", "STOP"]);
    }

    #[test]
    fn test_duration_bounds_in_schema() {
        let shock = tool_schema(CommandKind::Shock);
        let duration = &shock["inputSchema"]["properties"]["shockers"]["items"]["properties"]["duration"];
        assert_eq!(duration["minimum"], 300);
        assert_eq!(duration["maximum"], 30000);
    }
}
