//! Exchange Implementations
//!
//! 거래소별 구현체

mod binance;
mod binance_ws;
mod bithumb;
mod upbit;

pub use binance::{Binance, BinanceResponse, Candlestick, SymbolPrice};
pub use binance_ws::{BinanceWs, Candle, CandleEvent};
pub use bithumb::{
    Bithumb, BithumbAccount, BithumbAllTickers, BithumbBalance, BithumbContract,
    BithumbOrderDetail, BithumbOrderInfo, BithumbOrderbook, BithumbOrderbookEntry,
    BithumbResponse, BithumbStatus, BithumbTicker, BithumbTickerInfo, BithumbTradeResponse,
    BithumbTransaction, BithumbUserTransaction, BithumbWalletAddress,
};
pub use upbit::{
    ChanceMarket, DayCandle, MarketConstraint, MinuteCandle, MonthCandle, OrdType, OrderSide,
    OrderState, OrderbookUnit, OrdersChance, RemainingReq, TradeTick, Upbit, UpbitAccount,
    UpbitMarket, UpbitOrder, UpbitOrderbook, UpbitResponse, UpbitTicker, WeekCandle,
};
