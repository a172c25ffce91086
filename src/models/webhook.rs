use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// 商城 "订单已付款" 事件 (只解析用得到的字段)
///
/// 商城不同版本的推送里 id / 价格有时是数字有时是字符串, 这里统一宽松解析;
/// 缺少 id / customer.id / line_items 视为格式错误。
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OrderPaidEvent {
    #[serde(deserialize_with = "de_id_string")]
    pub id: String,
    #[serde(default)]
    pub financial_status: Option<String>,
    pub customer: EventCustomer,
    pub line_items: Vec<EventLineItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EventCustomer {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EventLineItem {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub product_id: Option<i64>,
    #[serde(default, deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_i64")]
    pub quantity: i64,
}

impl OrderPaidEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn is_paid(&self) -> bool {
        self.financial_status.as_deref() == Some("paid")
    }
}

fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    value_to_i64(&v).ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {v}")))
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_to_i64(&v))
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    match &v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null => Some(0.0),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("expected number, got {v}")))
}

fn de_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    match v {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        other => Err(serde::de::Error::custom(format!("invalid order id: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_numbers_and_strings() {
        let body = br#"{
            "id": 1000123,
            "financial_status": "paid",
            "customer": {"id": "42"},
            "line_items": [
                {"product_id": 777, "price": "350000", "quantity": 1},
                {"product_id": null, "price": 12.5, "quantity": "2"}
            ]
        }"#;
        let event = OrderPaidEvent::from_slice(body).unwrap();
        assert_eq!(event.id, "1000123");
        assert!(event.is_paid());
        assert_eq!(event.customer.id, 42);
        assert_eq!(event.line_items[0].product_id, Some(777));
        assert_eq!(event.line_items[0].price, 350000.0);
        assert_eq!(event.line_items[1].product_id, None);
        assert_eq!(event.line_items[1].quantity, 2);
    }

    #[test]
    fn test_missing_required_fields_is_malformed() {
        assert!(OrderPaidEvent::from_slice(br#"{"id": 1, "line_items": []}"#).is_err());
        assert!(OrderPaidEvent::from_slice(br#"{"customer": {"id": 1}, "line_items": []}"#).is_err());
        assert!(
            OrderPaidEvent::from_slice(br#"{"id": "", "customer": {"id": 1}, "line_items": []}"#)
                .is_err()
        );
        assert!(OrderPaidEvent::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_missing_status_is_not_paid() {
        let event =
            OrderPaidEvent::from_slice(br#"{"id": 5, "customer": {"id": 1}, "line_items": []}"#)
                .unwrap();
        assert!(!event.is_paid());
    }
}
