pub mod core {
    pub mod app;
    pub mod config;
    pub mod error;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod api {
    pub mod client;
    pub mod types;
}

pub mod models {
    pub mod admin;
    pub mod character;
    pub mod message;
    pub mod user;
}

pub mod stores {
    pub mod quota;
    pub mod storage;
    pub mod transcript;
}

pub mod session {
    pub mod manager;
    pub mod resolver;
}

pub mod chat {
    pub mod transport;
}

pub mod router {
    pub mod routes;
}

pub mod validation {
    pub mod forms;
}

pub mod utils {
    pub mod text;
    pub mod time;
}

#[cfg(test)]
pub mod test_support;
