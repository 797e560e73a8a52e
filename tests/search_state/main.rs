mod compare;
mod filters;
mod query;
mod store;
mod support;
