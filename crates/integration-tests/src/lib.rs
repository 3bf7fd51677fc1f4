//! Black-box tests for the WorldFeed HTTP surface and store-backed services live under `tests/`.
