// Wiki HTTP API: router, middleware and handlers

pub mod cookies;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod templates;
