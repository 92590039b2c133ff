//! Client configuration.

/// Tunables for a single connection.
///
/// The defaults suit typical request/reply workloads; bump
/// `read_buffer_capacity` for pipelines that move large bulk values.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Initial capacity of the read buffer. 4 KB covers most replies
    /// without over-allocating for PING/GET/SET traffic.
    pub read_buffer_capacity: usize,

    /// Disable Nagle's algorithm on TCP connections. Small pipelined
    /// commands are latency-sensitive, so this defaults to on.
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            read_buffer_capacity: 4096,
            tcp_nodelay: true,
        }
    }
}
