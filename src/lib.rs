pub mod cluster;
pub mod config;
pub mod db;
pub mod kernel; // banded lane-parallel distance engine + scalar aligner
pub mod output;
pub mod scan;
pub mod score;
pub mod variant; // unit-distance engine (d = 1 fast path)
