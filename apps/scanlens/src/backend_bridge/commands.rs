//! Backend commands queued from UI to the analyzer worker.

pub enum BackendCommand {
    Analyze {
        /// JPEG bytes from the capture collaborator.
        image_jpeg: Vec<u8>,
    },
}
