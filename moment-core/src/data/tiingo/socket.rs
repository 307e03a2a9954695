//! Tiingo IEX websocket messages.
//!
//! Outgoing: subscribe / unsubscribe requests. Incoming: frames shaped
//! `{"messageType":"A","data":[kind, date, nanos, ticker, ..., lastPrice, ...]}`.
//! Heartbeats (`H`) and info / subscription acks (`I`) carry no event.

use crate::data::FinanceError;
use crate::domain::{Price, Symbol};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-of-book threshold; 5 delivers last-trade updates only.
pub const DEFAULT_THRESHOLD: &str = "5";

const KIND_INDEX: usize = 0;
const DATE_INDEX: usize = 1;
const TICKER_INDEX: usize = 3;
const LAST_PRICE_INDEX: usize = 9;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SocketRequest<'a> {
    event_name: &'a str,
    authorization: &'a str,
    event_data: EventData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventData<'a> {
    threshold_level: &'a str,
}

fn request(event_name: &str, api_key: &str) -> String {
    let req = SocketRequest {
        event_name,
        authorization: api_key,
        event_data: EventData {
            threshold_level: DEFAULT_THRESHOLD,
        },
    };
    // Plain string fields always serialize.
    serde_json::to_string(&req).unwrap_or_default()
}

pub fn subscribe_message(api_key: &str) -> String {
    request("subscribe", api_key)
}

pub fn unsubscribe_message(api_key: &str) -> String {
    request("unsubscribe", api_key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IexKind {
    Trade,
    Quote,
    Break,
}

impl IexKind {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "T" => Some(IexKind::Trade),
            "Q" => Some(IexKind::Quote),
            "B" => Some(IexKind::Break),
            _ => None,
        }
    }
}

/// One decoded IEX update.
#[derive(Debug, Clone, PartialEq)]
pub struct IexEvent {
    pub kind: IexKind,
    pub symbol: Symbol,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub last_price: Option<f64>,
}

impl IexEvent {
    pub fn into_price(self) -> Price {
        Price {
            symbol: self.symbol,
            last_trade: self.timestamp,
            price: self.last_price,
            previous_close: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    message_type: Option<String>,
    data: Option<Value>,
}

/// Decode one text frame.
///
/// `Ok(None)` for frames that carry no usable event: non-data messages,
/// unknown update kinds and rows without a valid ticker. A present but
/// mistyped date or price is an error.
pub fn decode_frame(text: &str) -> Result<Option<IexEvent>, FinanceError> {
    let frame: Frame = serde_json::from_str(text)
        .map_err(|e| FinanceError::ResponseFormatChanged(format!("iex frame: {e}")))?;

    if frame.message_type.as_deref() != Some("A") {
        return Ok(None);
    }

    let Some(Value::Array(data)) = frame.data else {
        return Err(FinanceError::ResponseFormatChanged(
            "iex data frame without a data array".into(),
        ));
    };

    let Some(kind) = data.get(KIND_INDEX).and_then(Value::as_str).and_then(IexKind::from_code) else {
        return Ok(None);
    };

    let Some(symbol) = data
        .get(TICKER_INDEX)
        .and_then(Value::as_str)
        .and_then(|t| Symbol::parse(t).ok())
    else {
        return Ok(None);
    };

    let timestamp = match data.get(DATE_INDEX) {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(DateTime::parse_from_rfc3339(raw).map_err(|e| {
            FinanceError::ResponseFormatChanged(format!("iex date '{raw}': {e}"))
        })?),
        Some(other) => {
            return Err(FinanceError::ResponseFormatChanged(format!(
                "iex date is not a string: {other}"
            )))
        }
    };

    let last_price = match data.get(LAST_PRICE_INDEX) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            return Err(FinanceError::ResponseFormatChanged(format!(
                "iex last price is not a number: {other}"
            )))
        }
    };

    Ok(Some(IexEvent {
        kind,
        symbol,
        timestamp,
        last_price,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_wire_format() {
        let msg: Value = serde_json::from_str(&subscribe_message("secret")).unwrap();
        assert_eq!(
            msg,
            serde_json::json!({
                "eventName": "subscribe",
                "authorization": "secret",
                "eventData": {"thresholdLevel": "5"}
            })
        );

        let msg: Value = serde_json::from_str(&unsubscribe_message("secret")).unwrap();
        assert_eq!(msg["eventName"], "unsubscribe");
        assert_eq!(msg["eventData"]["thresholdLevel"], "5");
    }

    #[test]
    fn trade_frame() {
        let text = r#"{"messageType":"A","service":"iex","data":
            ["T","2019-01-30T13:33:45.594808294-05:00",1548873225594808294,"wes",
             null,null,null,null,null,50.285,200,null,0,0,0,0]}"#;
        let event = decode_frame(text).unwrap().unwrap();
        assert_eq!(event.kind, IexKind::Trade);
        assert_eq!(event.symbol.as_str(), "WES");
        assert_eq!(event.last_price, Some(50.285));
        assert_eq!(event.timestamp.unwrap().offset().local_minus_utc(), -5 * 3600);

        let price = event.into_price();
        assert_eq!(price.price, Some(50.285));
        assert_eq!(price.previous_close, None);
    }

    #[test]
    fn quote_frame_keeps_kind() {
        let text = r#"{"messageType":"A","data":
            ["Q","2019-01-30T13:33:45.383129126-05:00",1548873225383129126,"vym",
             100,81.58,81.585,81.59,100,null,null,0,0,null,null,null]}"#;
        let event = decode_frame(text).unwrap().unwrap();
        assert_eq!(event.kind, IexKind::Quote);
        assert_eq!(event.last_price, None);
    }

    #[test]
    fn control_frames_carry_no_event() {
        assert_eq!(decode_frame(r#"{"messageType":"H","response":{"code":200,"message":"HeartBeat"}}"#).unwrap(), None);
        assert_eq!(
            decode_frame(r#"{"messageType":"I","data":{"subscriptionId":61},"response":{"code":200}}"#).unwrap(),
            None
        );
    }

    #[test]
    fn unknown_kind_or_missing_ticker_is_skipped() {
        assert_eq!(decode_frame(r#"{"messageType":"A","data":["X","2019-01-30T13:33:45-05:00",0,"spy"]}"#).unwrap(), None);
        assert_eq!(decode_frame(r#"{"messageType":"A","data":["T","2019-01-30T13:33:45-05:00",0,null]}"#).unwrap(), None);
        assert_eq!(decode_frame(r#"{"messageType":"A","data":["T"]}"#).unwrap(), None);
    }

    #[test]
    fn malformed_fields_are_errors() {
        let bad_date = r#"{"messageType":"A","data":["T","30/01/2019",0,"spy",null,null,null,null,null,1.0]}"#;
        assert!(decode_frame(bad_date).is_err());

        let bad_price = r#"{"messageType":"A","data":["T","2019-01-30T13:33:45-05:00",0,"spy",null,null,null,null,null,"1.0"]}"#;
        assert!(decode_frame(bad_price).is_err());

        assert!(decode_frame(r#"{"messageType":"A","data":{"oops":1}}"#).is_err());
        assert!(decode_frame("not json").is_err());
    }
}
