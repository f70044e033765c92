// -----------------------------------------------------------------------------
// ----- Connector -------------------------------------------------------------

/// Opens and health-checks connections for one backend flavor.
///
/// Both methods block. They are only ever called from pool construction and
/// from the pool's sweep thread, never while the pool lock is held.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Trivial round-trip proving the connection is still usable.
    fn is_alive(&self, conn: &mut Self::Connection) -> Result<(), Self::Error>;
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
