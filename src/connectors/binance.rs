// src/connectors/binance.rs
use crate::connectors::traits::{ExchangeGateway, GatewayResult};
use crate::error::GatewayError;
use crate::types::{
    AssetBalance, Credentials, MarketEntry, OpenOrder, OrderResponse, Side, Symbol,
    WithdrawalReceipt,
};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Signed-REST Binance spot gateway.
///
/// Keeps the id -> symbol table from the last `exchangeInfo` load so bulk
/// ticker responses (keyed `BTCUSDT`) can be mapped back to canonical
/// symbols; ids the table does not know are skipped.
pub struct BinanceGateway {
    credentials: RwLock<Option<Credentials>>,
    markets: RwLock<HashMap<String, Symbol>>,
    http_client: Client,
    base_rest_url: String,
}

impl BinanceGateway {
    pub fn new() -> Self {
        Self::with_base_url("https://api.binance.com".to_string())
    }

    pub fn with_base_url(base_rest_url: String) -> Self {
        Self {
            credentials: RwLock::new(None),
            markets: RwLock::new(HashMap::new()),
            http_client: Client::new(),
            base_rest_url,
        }
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> GatewayResult<String> {
        let creds = self
            .credentials
            .read()
            .unwrap()
            .clone()
            .ok_or(GatewayError::Unauthenticated)?;

        let mut params = params;
        let timestamp = Utc::now().timestamp_millis().to_string();
        params.push(("timestamp", timestamp));

        let query_string = serde_urlencoded::to_string(&params)
            .map_err(|e| GatewayError::Malformed(format!("query encoding: {e}")))?;

        let mut mac = HmacSha256::new_from_slice(creds.secret_key.as_bytes())
            .map_err(|_| GatewayError::Malformed("invalid secret key length".to_string()))?;
        mac.update(query_string.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}&signature={}", query_string, signature))
    }

    async fn send_signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> GatewayResult<T> {
        let api_key = self
            .credentials
            .read()
            .unwrap()
            .as_ref()
            .map(|c| c.api_key.clone())
            .ok_or(GatewayError::Unauthenticated)?;

        let full_query = self.sign_and_build_query(params)?;
        let url = format!("{}{}?{}", self.base_rest_url, endpoint, full_query);

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Turns a non-2xx reply into `Rejected` carrying Binance's own message.
    async fn check_status(response: Response) -> GatewayResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        #[derive(Deserialize)]
        struct ApiError {
            code: i64,
            msg: String,
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<ApiError>(&body) {
            Ok(e) => format!("{} (code {})", e.msg, e.code),
            Err(_) => format!("HTTP {status}: {body}"),
        };
        Err(GatewayError::Rejected(reason))
    }

    fn lookup_symbol(&self, exchange_id: &str) -> Option<Symbol> {
        self.markets.read().unwrap().get(exchange_id).cloned()
    }

    async fn submit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> GatewayResult<OrderResponse> {
        let mut params = vec![
            ("symbol", symbol.exchange_id()),
            ("side", side.as_str().to_string()),
            ("quantity", quantity.to_string()),
        ];
        match price {
            Some(p) => {
                params.push(("type", "LIMIT".to_string()));
                params.push(("timeInForce", "GTC".to_string()));
                params.push(("price", p.to_string()));
            }
            None => params.push(("type", "MARKET".to_string())),
        }

        #[derive(Deserialize)]
        struct BinanceOrderResponse {
            #[serde(rename = "orderId")]
            order_id: u64,
            symbol: String,
            status: String,
        }

        info!(
            "sending order: {} {} {} @ {:?}",
            side.as_str(),
            quantity,
            symbol,
            price
        );

        let resp: BinanceOrderResponse = self
            .send_signed_request(Method::POST, "/api/v3/order", params)
            .await?;

        Ok(OrderResponse {
            id: resp.order_id.to_string(),
            symbol: resp.symbol,
            status: resp.status,
        })
    }
}

impl Default for BinanceGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_decimal(value: &str, what: &str) -> GatewayResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| GatewayError::Malformed(format!("{what}: not a decimal: {value:?}")))
}

#[derive(Deserialize)]
struct PriceTicker {
    symbol: String,
    price: String,
}

#[async_trait]
impl ExchangeGateway for BinanceGateway {
    async fn connect(&self, credentials: Option<Credentials>) -> GatewayResult<Vec<MarketEntry>> {
        *self.credentials.write().unwrap() = credentials;

        let url = format!("{}/api/v3/ping", self.base_rest_url);
        let response = self.http_client.get(&url).send().await?;
        Self::check_status(response).await?;

        self.fetch_markets().await
    }

    async fn fetch_markets(&self) -> GatewayResult<Vec<MarketEntry>> {
        #[derive(Deserialize)]
        struct SymbolFilter {
            #[serde(rename = "filterType")]
            filter_type: String,
            #[serde(rename = "stepSize")]
            step_size: Option<String>,
            #[serde(rename = "minNotional")]
            min_notional: Option<String>,
        }

        #[derive(Deserialize)]
        struct SymbolInfo {
            #[serde(rename = "baseAsset")]
            base_asset: String,
            #[serde(rename = "quoteAsset")]
            quote_asset: String,
            status: String,
            filters: Vec<SymbolFilter>,
        }

        #[derive(Deserialize)]
        struct ExchangeInfo {
            symbols: Vec<SymbolInfo>,
        }

        let url = format!("{}/api/v3/exchangeInfo", self.base_rest_url);
        let response = self.http_client.get(&url).send().await?;
        let info: ExchangeInfo = Self::check_status(response).await?.json().await?;

        let mut entries = Vec::new();
        let mut id_table = HashMap::new();
        for sym in info.symbols {
            if sym.status != "TRADING" {
                continue;
            }
            let Some(symbol) = Symbol::new(&sym.base_asset, &sym.quote_asset) else {
                warn!(
                    "skipping degenerate pair {}/{}",
                    sym.base_asset, sym.quote_asset
                );
                continue;
            };

            let mut min_notional = Decimal::ZERO;
            let mut step_size = None;
            for filter in &sym.filters {
                match filter.filter_type.as_str() {
                    "LOT_SIZE" => step_size = filter.step_size.clone(),
                    "NOTIONAL" | "MIN_NOTIONAL" => {
                        if let Some(m) = &filter.min_notional {
                            min_notional = parse_decimal(m, "minNotional")?;
                        }
                    }
                    _ => {}
                }
            }

            id_table.insert(symbol.exchange_id(), symbol.clone());
            entries.push(MarketEntry {
                symbol,
                min_notional,
                step_size,
            });
        }

        *self.markets.write().unwrap() = id_table;
        info!("loaded {} tradable markets", entries.len());
        Ok(entries)
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> GatewayResult<Option<Decimal>> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_rest_url,
            symbol.exchange_id()
        );
        let response = self.http_client.get(&url).send().await?;
        // Binance answers 400 for pairs it does not list.
        if response.status().is_client_error() {
            return Ok(None);
        }
        let ticker: PriceTicker = Self::check_status(response).await?.json().await?;
        Ok(Some(parse_decimal(&ticker.price, "ticker price")?))
    }

    async fn fetch_tickers(&self) -> GatewayResult<HashMap<Symbol, Decimal>> {
        let url = format!("{}/api/v3/ticker/price", self.base_rest_url);
        let response = self.http_client.get(&url).send().await?;
        let tickers: Vec<PriceTicker> = Self::check_status(response).await?.json().await?;

        let mut out = HashMap::new();
        for ticker in tickers {
            if let Some(symbol) = self.lookup_symbol(&ticker.symbol) {
                out.insert(symbol, parse_decimal(&ticker.price, "ticker price")?);
            }
        }
        Ok(out)
    }

    async fn fetch_balances(&self) -> GatewayResult<HashMap<String, AssetBalance>> {
        #[derive(Deserialize)]
        struct RawBalance {
            asset: String,
            free: String,
            locked: String,
        }
        #[derive(Deserialize)]
        struct AccountInfo {
            balances: Vec<RawBalance>,
        }

        let resp: AccountInfo = self
            .send_signed_request(Method::GET, "/api/v3/account", vec![])
            .await?;

        let mut out = HashMap::new();
        for bal in resp.balances {
            let free = parse_decimal(&bal.free, "free balance")?;
            let locked = parse_decimal(&bal.locked, "locked balance")?;
            out.insert(
                bal.asset,
                AssetBalance {
                    free,
                    total: free + locked,
                },
            );
        }
        Ok(out)
    }

    async fn fetch_open_orders(&self) -> GatewayResult<Vec<OpenOrder>> {
        #[derive(Deserialize)]
        struct RawOrder {
            #[serde(rename = "orderId")]
            order_id: u64,
            symbol: String,
        }

        let orders: Vec<RawOrder> = self
            .send_signed_request(Method::GET, "/api/v3/openOrders", vec![])
            .await?;

        let mut out = Vec::new();
        for order in orders {
            match self.lookup_symbol(&order.symbol) {
                Some(symbol) => out.push(OpenOrder {
                    id: order.order_id.to_string(),
                    symbol,
                }),
                None => warn!(
                    "open order {} on unknown market {}",
                    order.order_id, order.symbol
                ),
            }
        }
        Ok(out)
    }

    async fn cancel_order(&self, order_id: &str, symbol: &Symbol) -> GatewayResult<()> {
        let params = vec![
            ("symbol", symbol.exchange_id()),
            ("orderId", order_id.to_string()),
        ];
        let _: serde_json::Value = self
            .send_signed_request(Method::DELETE, "/api/v3/order", params)
            .await?;
        Ok(())
    }

    async fn place_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> GatewayResult<OrderResponse> {
        self.submit_order(symbol, side, quantity, None).await
    }

    async fn place_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> GatewayResult<OrderResponse> {
        self.submit_order(symbol, side, quantity, Some(price)).await
    }

    async fn withdraw(
        &self,
        asset: &str,
        amount: Decimal,
        address: &str,
        network: &str,
    ) -> GatewayResult<WithdrawalReceipt> {
        #[derive(Deserialize)]
        struct WithdrawResponse {
            id: String,
        }

        let params = vec![
            ("coin", asset.to_string()),
            ("amount", amount.to_string()),
            ("address", address.to_string()),
            ("network", network.to_string()),
        ];

        let resp: WithdrawResponse = self
            .send_signed_request(Method::POST, "/sapi/v1/capital/withdraw/apply", params)
            .await?;

        Ok(WithdrawalReceipt { id: resp.id })
    }
}
