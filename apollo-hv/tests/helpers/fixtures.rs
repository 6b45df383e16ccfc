//! Database and media fixtures

use apollo_common::db::{Location, MediaRef};
use apollo_hv::db::{media, reports};
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::io::Cursor;

/// Fresh in-memory database with the full schema
///
/// Single connection so every query sees the same memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    apollo_common::db::init_schema(&pool).await.unwrap();
    pool
}

/// Small solid-orange PNG
pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(32, 24, Rgb([255, 120, 0]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn location(address: &str) -> Location {
    Location {
        latitude: 14.5995,
        longitude: 120.9842,
        address: address.to_string(),
    }
}

/// Pending report with a PNG image attached; returns (report_id, media_id)
pub async fn seed_image_report(pool: &SqlitePool) -> (i64, i64) {
    let media_id = media::insert_media(pool, 1, "image/png", "fire.png", &png_bytes())
        .await
        .unwrap();
    let report_id = reports::insert_report(
        pool,
        1,
        MediaRef::Image(media_id),
        &location("Tondo, Manila"),
        Utc::now(),
    )
    .await
    .unwrap();
    (report_id, media_id)
}

/// Pending report with an (opaque) video attached
pub async fn seed_video_report(pool: &SqlitePool) -> (i64, i64) {
    let clip = [0u8, 0, 0, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2', 0, 0, 0, 0];
    let media_id = media::insert_media(pool, 2, "video/mp4", "fire.mp4", &clip)
        .await
        .unwrap();
    let report_id = reports::insert_report(
        pool,
        2,
        MediaRef::Video(media_id),
        &location("Pasig City"),
        Utc::now(),
    )
    .await
    .unwrap();
    (report_id, media_id)
}

/// Pending report whose media reference points at nothing
pub async fn seed_orphan_report(pool: &SqlitePool, media_id: i64) -> i64 {
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(pool)
        .await
        .unwrap();
    let report_id = reports::insert_report(
        pool,
        3,
        MediaRef::Image(media_id),
        &location("Nowhere"),
        Utc::now(),
    )
    .await
    .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await
        .unwrap();
    report_id
}

/// Pending report whose blob holds zero bytes
pub async fn seed_empty_blob_report(pool: &SqlitePool) -> i64 {
    let media_id = media::insert_media(pool, 4, "image/jpeg", "empty.jpg", &[])
        .await
        .unwrap();
    reports::insert_report(
        pool,
        4,
        MediaRef::Image(media_id),
        &location("Makati"),
        Utc::now(),
    )
    .await
    .unwrap()
}

pub async fn status_of(pool: &SqlitePool, report_id: i64) -> (bool, String) {
    sqlx::query_as("SELECT verified, status FROM reports WHERE report_id = ?")
        .bind(report_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn verdict_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM verdicts")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Report ids in the order their verdicts were written
pub async fn verdict_report_order(pool: &SqlitePool) -> Vec<i64> {
    sqlx::query_scalar("SELECT report_id FROM verdicts ORDER BY verification_id ASC")
        .fetch_all(pool)
        .await
        .unwrap()
}

/// Pending report pointing at both an image and a video
///
/// Only possible in tables created before the media CHECK existed, so the
/// constraint is suspended for the insert.
pub async fn seed_double_media_report(pool: &SqlitePool, media_id: i64) -> i64 {
    sqlx::query("PRAGMA ignore_check_constraints = ON")
        .execute(pool)
        .await
        .unwrap();
    let report_id = sqlx::query(
        "INSERT INTO reports (user_id, image_id, video_id, latitude, longitude, address, submitted_at) \
         VALUES (5, ?, ?, 0, 0, 'Legacy row', '2025-06-01T00:00:00Z')",
    )
    .bind(media_id)
    .bind(media_id)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();
    sqlx::query("PRAGMA ignore_check_constraints = OFF")
        .execute(pool)
        .await
        .unwrap();
    report_id
}
