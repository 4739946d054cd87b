use super::{
    CronExpression, DateSequence, ExpressionType, ScheduleExpression, ScheduleSpec, SolarEventList,
    SolarType,
};
use crate::constants::defaults;
use crate::errors::ValidationError;
use crate::payload::PayloadKind;
use crate::solar::SolarEvent;
use serde_json::Value;

/// Fill the gaps in a partially specified schedule.
///
/// `index` is the position of the spec in its source list and only feeds the
/// generated name (`schedule1`, `schedule2`, ...).
pub fn apply_defaults(spec: &mut ScheduleSpec, index: usize) {
    let expression_type = spec.expression_type.clone();
    match expression_type.as_str() {
        "" => {
            let is_dates = spec
                .expression
                .as_ref()
                .map(DateSequence::is_date_sequence)
                .unwrap_or(false);
            spec.expression_type = if is_dates { "dates" } else { "cron" }.to_string();
        }
        "cron" | "dates" | "solar" => {}
        // Older configurations used the event name as the schedule type
        legacy @ ("sunrise" | "sunset") => {
            if spec.solar_events.is_none() {
                spec.solar_events = Some(SolarEventList::from(legacy));
            }
            spec.expression_type = "solar".to_string();
        }
        _ => spec.expression_type = "cron".to_string(),
    }

    if spec.name.is_empty() {
        spec.name = format!("schedule{}", index + 1);
    }
    if spec.topic.is_empty() {
        spec.topic = spec.name.clone();
    }
    if spec.payload_type.is_empty() {
        spec.payload_type = spec
            .legacy_type
            .take()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| defaults::PAYLOAD_TYPE.to_string());
    }
    spec.legacy_type = None;

    let missing_expression = spec.expression.as_ref().map(ScheduleExpression::is_empty).unwrap_or(true);
    if spec.expression_type == "cron" && missing_expression {
        spec.expression = Some(ScheduleExpression::from(defaults::CRON_EXPRESSION));
    }
    if spec.solar_type.is_empty() {
        spec.solar_type = if spec.solar_events.is_some() { "selected" } else { "all" }.to_string();
    }
    if spec.solar_events.is_none() {
        spec.solar_events = Some(SolarEventList::from(defaults::SOLAR_EVENTS));
    }
}

/// Check a spec and settle its expression type.
///
/// A cron/dates expression is classified by content: anything the cron
/// engine accepts becomes `cron`, otherwise it must parse as a date
/// sequence. Empty payloads of `num`/`str`/`bool` schedules are given their
/// zero value.
pub fn validate(spec: &mut ScheduleSpec) -> Result<ExpressionType, ValidationError> {
    if spec.name.is_empty() {
        return Err(ValidationError::MissingName);
    }
    let name = spec.name.clone();

    let kind = match spec.expression_type.as_str() {
        "" | "cron" | "dates" => {
            let expression = match spec.expression.as_ref() {
                Some(expression) if !expression.is_empty() => expression,
                _ => return Err(ValidationError::MissingExpression { name }),
            };
            let is_cron = expression
                .as_text()
                .map(CronExpression::is_valid)
                .unwrap_or(false);
            if is_cron {
                ExpressionType::Cron
            } else if DateSequence::is_date_sequence(expression) {
                ExpressionType::Dates
            } else {
                return Err(ValidationError::InvalidExpression {
                    name,
                    expression: expression.to_string(),
                });
            }
        }
        "solar" => {
            validate_solar(spec)?;
            ExpressionType::Solar
        }
        other => {
            return Err(ValidationError::InvalidExpressionType {
                name,
                expression_type: other.to_string(),
            })
        }
    };
    spec.expression_type = kind.as_str().to_string();

    let payload_type = if spec.payload_type.is_empty() {
        spec.legacy_type.clone().unwrap_or_default()
    } else {
        spec.payload_type.clone()
    };
    if !payload_type.is_empty() && payload_type.parse::<PayloadKind>().is_err() {
        return Err(ValidationError::InvalidPayloadType {
            name: spec.name.clone(),
            payload_type,
        });
    }

    let empty_payload = match &spec.payload {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty_payload {
        match payload_type.as_str() {
            "num" => spec.payload = Value::from(0),
            "str" => spec.payload = Value::from(""),
            "bool" => spec.payload = Value::from(false),
            _ => {}
        }
    }

    Ok(kind)
}

fn validate_solar(spec: &ScheduleSpec) -> Result<(), ValidationError> {
    let name = spec.name.clone();
    if spec.location.trim().is_empty() {
        return Err(ValidationError::MissingLocation { name });
    }
    let solar_type: SolarType = spec
        .solar_type
        .parse()
        .map_err(|_| ValidationError::InvalidSolarType { name: name.clone() })?;

    if solar_type == SolarType::Selected {
        let events = spec
            .solar_events
            .as_ref()
            .ok_or_else(|| ValidationError::MissingSolarEvents { name: name.clone() })?;
        let names = events.names();
        if names.is_empty() {
            return Err(ValidationError::EmptySolarEvents { name });
        }
        if let Some(bad) = names.iter().find(|n| n.parse::<SolarEvent>().is_err()) {
            return Err(ValidationError::InvalidSolarEvent {
                name,
                event: bad.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> ScheduleSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_fill_name_topic_and_cron() {
        let mut s = spec(json!({}));
        apply_defaults(&mut s, 2);

        assert_eq!(s.name, "schedule3");
        assert_eq!(s.topic, "schedule3");
        assert_eq!(s.expression_type, "cron");
        assert_eq!(s.payload_type, "default");
        assert_eq!(s.expression.unwrap().as_text(), Some(defaults::CRON_EXPRESSION));
        assert_eq!(s.solar_type, "all");
    }

    #[test]
    fn test_legacy_sunset_type_migrates_to_solar() {
        let mut s = spec(json!({"name": "dusk", "expressionType": "sunset", "type": "str"}));
        apply_defaults(&mut s, 0);

        assert_eq!(s.expression_type, "solar");
        assert_eq!(s.solar_type, "selected");
        assert_eq!(s.solar_events.unwrap().names(), vec!["sunset"]);
        assert_eq!(s.payload_type, "str");
        assert!(s.legacy_type.is_none());
    }

    #[test]
    fn test_blank_type_detects_dates() {
        let mut s = spec(json!({"expression": "2030-01-01T00:00:00Z"}));
        apply_defaults(&mut s, 0);
        assert_eq!(s.expression_type, "dates");
    }

    #[test]
    fn test_cron_text_under_dates_type_is_reclassified() {
        let mut s = spec(json!({"name": "a", "expressionType": "dates", "expression": "*/5 * * * * *"}));
        assert_eq!(validate(&mut s).unwrap(), ExpressionType::Cron);
        assert_eq!(s.expression_type, "cron");
    }

    #[test]
    fn test_validation_errors_name_the_field() {
        let mut s = spec(json!({"expression": "* * * * *"}));
        assert_eq!(validate(&mut s), Err(ValidationError::MissingName));

        let mut s = spec(json!({"name": "a", "expressionType": "cron"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::MissingExpression { .. })));

        let mut s = spec(json!({"name": "a", "expression": "next tuesday"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::InvalidExpression { .. })));

        let mut s = spec(json!({"name": "a", "expressionType": "weekly"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::InvalidExpressionType { .. })));

        let mut s = spec(json!({"name": "a", "expression": "* * * * *", "payloadType": "xml"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::InvalidPayloadType { .. })));
    }

    #[test]
    fn test_solar_validation() {
        let mut s = spec(json!({"name": "s", "expressionType": "solar", "solarType": "all"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::MissingLocation { .. })));

        let mut s = spec(json!({"name": "s", "expressionType": "solar", "location": "0,0", "solarType": "some"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::InvalidSolarType { .. })));

        let mut s = spec(json!({"name": "s", "expressionType": "solar", "location": "0,0", "solarType": "selected"}));
        assert!(matches!(validate(&mut s), Err(ValidationError::MissingSolarEvents { .. })));

        let mut s = spec(json!({"name": "s", "expressionType": "solar", "location": "0,0", "solarType": "selected", "solarEvents": []}));
        assert!(matches!(validate(&mut s), Err(ValidationError::EmptySolarEvents { .. })));

        let mut s = spec(json!({"name": "s", "expressionType": "solar", "location": "0,0", "solarType": "selected", "solarEvents": "sunrise,astronomicalDusk"}));
        assert_eq!(
            validate(&mut s),
            Err(ValidationError::InvalidSolarEvent {
                name: "s".to_string(),
                event: "astronomicalDusk".to_string()
            })
        );

        let mut s = spec(json!({"name": "s", "expressionType": "solar", "location": "0,0", "solarType": "selected", "solarEvents": ["sunrise", "nadir"]}));
        assert_eq!(validate(&mut s), Ok(ExpressionType::Solar));
    }

    #[test]
    fn test_empty_payload_gets_zero_value() {
        let mut s = spec(json!({"name": "n", "expression": "* * * * *", "payloadType": "num", "payload": ""}));
        validate(&mut s).unwrap();
        assert_eq!(s.payload, json!(0));

        let mut s = spec(json!({"name": "b", "expression": "* * * * *", "payloadType": "bool"}));
        validate(&mut s).unwrap();
        assert_eq!(s.payload, json!(false));
    }
}
