//! roofdesk
//!
//! 屋根工事向けの顧客管理: 顧客・提案書（パケット）・点検・工事日程・クイックキャプチャ

pub mod capture;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod export;
pub mod inspections;
pub mod jobs;
pub mod media;
pub mod packets;
pub mod repo;
pub mod signature;
pub mod store;
pub mod transcribe;
pub mod voice;
