/*!
# CSV Dashboard

A small web application that turns an uploaded CSV file into summary
statistics and charts.

## Overview

A user uploads a CSV file through a web form and immediately sees a preview
of its first rows. The dashboard then re-reads the file and shows
descriptive statistics for a fixed set of vehicle features together with
four charts drawn from the first two columns. A JSON endpoint returns the
rows, optionally restricted to one `Category`.

## Architecture

### Core (always built)
- **loader**: parses delimited text into a [`loader::Table`] of typed columns
- **stats**: descriptive statistics over the allow-listed feature columns
- **storage**: writes uploads below a media root and keeps a dataset ledger
- **session**: session id → last uploaded file
- **config**: runtime settings from the environment

### Web layer (`web` feature)
- **charts**: bar, pie, histogram and scatter charts rendered to inline SVG
- **views**: page templates and HTML tables
- **app**: routing and request handlers

## REST API Endpoints

- `/` - Landing page
- `/upload/` - Upload form (GET) and CSV upload (POST, multipart field `file`)
- `/dashboard/` - Statistics and charts for the last uploaded file
- `/filtered-data/?filter=VALUE` - Rows as JSON, filtered on the `Category` column
- `/media/...` - Stored uploads
*/

pub mod config;
pub mod loader;
pub mod session;
pub mod stats;
pub mod storage;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod charts;
#[cfg(feature = "web")]
pub mod views;

pub use config::Config;
pub use loader::{Column, ColumnType, LoadError, Table, Value};
pub use session::SessionStore;
pub use stats::{FeatureSummary, Summary};
pub use storage::{Dataset, FileSystemStorage, StorageError, StoredFile};
