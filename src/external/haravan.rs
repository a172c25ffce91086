use crate::config::HaravanConfig;
use crate::error::{AppError, AppResult};
use crate::services::{FulfillmentGateway, FulfillmentRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const REWARD_TAG: &str = "Gacha_Reward";

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    pub order: OrderPayload,
}

#[derive(Debug, Serialize)]
pub struct OrderPayload {
    pub line_items: Vec<OrderLineItem>,
    pub customer: OrderCustomer,
    pub financial_status: String,
    pub note: String,
    pub tags: String,
}

#[derive(Debug, Serialize)]
pub struct OrderLineItem {
    pub product_id: i64,
    pub quantity: i64,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderCustomer {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderResponse {
    pub order: CreatedOrder,
}

#[derive(Debug, Deserialize)]
pub struct CreatedOrder {
    pub id: serde_json::Value,
}

impl CreateOrderRequest {
    /// 已用 xu 支付: 单价 0, 标记为已付款
    pub fn for_reward(request: &FulfillmentRequest) -> Self {
        Self {
            order: OrderPayload {
                line_items: vec![OrderLineItem {
                    product_id: request.product_id,
                    quantity: 1,
                    price: 0,
                }],
                customer: OrderCustomer {
                    id: request.customer_id,
                },
                financial_status: "paid".to_string(),
                note: format!(
                    "Gacha reward: {} (Pool: {}, draw {})",
                    request.item_name, request.pool_id, request.draw_id
                ),
                tags: REWARD_TAG.to_string(),
            },
        }
    }
}

/// Haravan Admin API 客户端 (只用到创建订单)
#[derive(Clone)]
pub struct HaravanClient {
    client: Client,
    config: HaravanConfig,
}

impl HaravanClient {
    pub fn new(config: HaravanConfig, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    pub async fn create_order(&self, payload: &CreateOrderRequest) -> AppResult<String> {
        let url = format!("{}/orders.json", self.config.admin_base_url());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(payload)
            .send()
            .await?;

        if response.status().is_success() {
            let created: CreateOrderResponse = response.json().await?;
            let id = match created.order.id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Ok(id)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Haravan create order failed ({status}): {error_text}"
            )))
        }
    }
}

#[async_trait]
impl FulfillmentGateway for HaravanClient {
    async fn place_order(&self, request: &FulfillmentRequest) -> AppResult<String> {
        self.create_order(&CreateOrderRequest::for_reward(request)).await
    }
}
