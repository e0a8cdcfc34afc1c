//! Korea Investment & Securities (KIS) REST brokerage adapter.
//!
//! Cash orders and balance queries for domestic equities. Response bodies are
//! parsed once into typed structs here; everything past this module sees
//! [`Balance`] and [`OrderAck`] only.

use crate::domain::account::{Balance, Holding};
use crate::domain::error::{BrokerError, TraderError};
use crate::domain::risk::Side;
use crate::ports::broker_port::{BrokerPort, OrderAck, SubmitFailure};
use crate::ports::config_port::ConfigPort;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const PAPER_BASE_URL: &str = "https://openapivts.koreainvestment.com:29443";

/// Tokens are valid for 24h; refresh an hour early.
const TOKEN_TTL: Duration = Duration::from_secs(23 * 60 * 60);

/// Market order division code.
const ORDER_DIVISION_MARKET: &str = "03";

#[derive(Debug, Clone, PartialEq)]
pub struct KisConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_secret: String,
    pub account_no: String,
    pub account_code: String,
    pub tr_id_buy: String,
    pub tr_id_sell: String,
    pub tr_id_balance: String,
    pub timeout_secs: u64,
}

impl KisConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let timeout_secs = config.get_int("broker", "timeout_secs", 10);
        if timeout_secs < 1 {
            return Err(TraderError::ConfigInvalid {
                section: "broker".into(),
                key: "timeout_secs".into(),
                reason: "timeout_secs must be at least 1".into(),
            });
        }

        Ok(Self {
            base_url: config
                .get_string("broker", "base_url")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| PAPER_BASE_URL.to_string()),
            app_key: config.require_string("broker", "app_key")?,
            app_secret: config.require_string("broker", "app_secret")?,
            account_no: config.require_string("broker", "account_no")?,
            account_code: config.require_string("broker", "account_code")?,
            tr_id_buy: config.require_string("broker", "tr_id_buy")?,
            tr_id_sell: config.require_string("broker", "tr_id_sell")?,
            tr_id_balance: config.require_string("broker", "tr_id_balance")?,
            timeout_secs: timeout_secs as u64,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Common envelope: `rt_cd` "0" means success.
#[derive(Debug, Deserialize)]
struct Envelope {
    rt_cd: Option<String>,
    msg1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    rt_cd: Option<String>,
    msg1: Option<String>,
    #[serde(default)]
    output1: Vec<HoldingRow>,
    #[serde(default)]
    output2: Vec<SummaryRow>,
}

#[derive(Debug, Deserialize)]
struct HoldingRow {
    pdno: Option<String>,
    hldg_qty: Option<String>,
    ord_psbl_qty: Option<String>,
    evlu_amt: Option<String>,
    prpr: Option<String>,
    pchs_amt: Option<String>,
    evlu_pfls_amt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryRow {
    dnca_tot_amt: Option<String>,
    nass_amt: Option<String>,
}

fn number(field: &Option<String>) -> Option<f64> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn business_error(rt_cd: Option<&str>, msg1: Option<&str>) -> Option<BrokerError> {
    match rt_cd {
        None | Some("0") => None,
        Some(code) => Some(BrokerError::Business {
            code: code.to_string(),
            message: msg1.unwrap_or_default().trim().to_string(),
        }),
    }
}

/// Parses an inquire-balance body into a [`Balance`].
pub fn parse_balance(body: &str) -> Result<Balance, BrokerError> {
    let resp: BalanceResponse =
        serde_json::from_str(body).map_err(|e| BrokerError::InvalidResponse {
            reason: e.to_string(),
        })?;
    if let Some(err) = business_error(resp.rt_cd.as_deref(), resp.msg1.as_deref()) {
        return Err(err);
    }

    let holdings = resp
        .output1
        .iter()
        .filter_map(|row| {
            let code = row.pdno.clone().filter(|c| !c.is_empty())?;
            let held_qty = number(&row.hldg_qty).unwrap_or(0.0) as i64;
            Some(Holding {
                code,
                held_qty,
                sellable_qty: number(&row.ord_psbl_qty).map_or(held_qty, |q| q as i64),
                eval_amount: number(&row.evlu_amt).unwrap_or(0.0),
                last_price: number(&row.prpr).filter(|p| *p > 0.0),
                purchase_amount: number(&row.pchs_amt).unwrap_or(0.0),
                pnl: number(&row.evlu_pfls_amt).unwrap_or(0.0),
            })
        })
        .collect();

    let cash = resp
        .output2
        .first()
        .and_then(|s| number(&s.dnca_tot_amt).or_else(|| number(&s.nass_amt)))
        .unwrap_or(0.0);

    Ok(Balance { holdings, cash })
}

/// Parses an order-cash body. A non-zero `rt_cd` fails with the body kept.
pub fn parse_order(body: &str) -> Result<OrderAck, SubmitFailure> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| SubmitFailure {
        error: BrokerError::InvalidResponse {
            reason: e.to_string(),
        },
        raw: Some(body.to_string()),
    })?;
    if let Some(error) = business_error(envelope.rt_cd.as_deref(), envelope.msg1.as_deref()) {
        return Err(SubmitFailure {
            error,
            raw: Some(body.to_string()),
        });
    }

    Ok(OrderAck {
        status: envelope.rt_cd.unwrap_or_else(|| "0".to_string()),
        price: None,
        filled_qty: None,
        raw: body.to_string(),
    })
}

pub struct KisBroker {
    config: KisConfig,
    client: reqwest::blocking::Client,
    token: Mutex<Option<(String, Instant)>>,
}

impl KisBroker {
    pub fn new(config: KisConfig) -> Result<Self, TraderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerError::Transport {
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            client,
            token: Mutex::new(None),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> BrokerError {
        if e.is_timeout() {
            BrokerError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            BrokerError::Transport {
                reason: e.to_string(),
            }
        }
    }

    fn access_token(&self) -> Result<String, BrokerError> {
        let mut cached = self.token.lock().map_err(|_| BrokerError::Transport {
            reason: "token cache poisoned".into(),
        })?;
        if let Some((token, issued)) = cached.as_ref() {
            if issued.elapsed() < TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        let url = format!("{}/oauth2/tokenP", self.config.base_url);
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.config.app_key,
            "appsecret": self.config.app_secret,
        });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(BrokerError::Transport {
                reason: format!("token request failed with HTTP {status}: {text}"),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&text).map_err(|e| BrokerError::InvalidResponse {
                reason: e.to_string(),
            })?;
        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::InvalidResponse {
                reason: "token response has no access_token".into(),
            })?;

        tracing::debug!("issued new broker access token");
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }

    fn authorized(
        &self,
        builder: reqwest::blocking::RequestBuilder,
        tr_id: &str,
    ) -> Result<reqwest::blocking::RequestBuilder, BrokerError> {
        let token = self.access_token()?;
        Ok(builder
            .header("content-type", "application/json; charset=utf-8")
            .header("authorization", format!("Bearer {token}"))
            .header("appkey", &self.config.app_key)
            .header("appsecret", &self.config.app_secret)
            .header("tr_id", tr_id))
    }
}

impl BrokerPort for KisBroker {
    fn get_balance(&self) -> Result<Balance, BrokerError> {
        let url = format!(
            "{}/uapi/domestic-stock/v1/trading/inquire-balance",
            self.config.base_url
        );
        let query = [
            ("CANO", self.config.account_no.as_str()),
            ("ACNT_PRDT_CD", self.config.account_code.as_str()),
            ("AFHR_FLPR_YN", "N"),
            ("OFL_YN", "N"),
            ("INQR_DVSN", "01"),
            ("UNPR_DVSN", "01"),
            ("FUND_STTL_ICLD_YN", "N"),
            ("FNCG_AMT_AUTO_RDPT_YN", "N"),
            ("PRCS_DVSN", "00"),
            ("CTX_AREA_FK100", ""),
            ("CTX_AREA_NK100", ""),
        ];

        let request = self.authorized(self.client.get(&url).query(&query), &self.config.tr_id_balance)?;
        let resp = request.send().map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let text = resp.text().map_err(|e| self.transport_error(e))?;

        match parse_balance(&text) {
            Ok(balance) if status.is_success() => Ok(balance),
            Ok(_) => Err(BrokerError::Transport {
                reason: format!("balance query failed with HTTP {status}"),
            }),
            Err(e) => Err(e),
        }
    }

    fn submit_order(&self, side: Side, code: &str, quantity: i64) -> Result<OrderAck, SubmitFailure> {
        let url = format!(
            "{}/uapi/domestic-stock/v1/trading/order-cash",
            self.config.base_url
        );
        let tr_id = match side {
            Side::Buy => &self.config.tr_id_buy,
            Side::Sell => &self.config.tr_id_sell,
        };
        let body = serde_json::json!({
            "CANO": self.config.account_no,
            "ACNT_PRDT_CD": self.config.account_code,
            "PDNO": code,
            "ORD_DVSN": ORDER_DIVISION_MARKET,
            "ORD_QTY": quantity.to_string(),
            "ORD_UNPR": "0",
        });

        let request = self.authorized(self.client.post(&url).json(&body), tr_id)?;
        let resp = request.send().map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let text = resp.text().map_err(|e| self.transport_error(e))?;

        let ack = parse_order(&text)?;
        if !status.is_success() {
            return Err(SubmitFailure {
                error: BrokerError::Transport {
                    reason: format!("order request failed with HTTP {status}"),
                },
                raw: Some(text),
            });
        }
        tracing::debug!(code, %side, quantity, "broker accepted order");
        Ok(ack)
    }
}
