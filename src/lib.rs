pub mod info;
pub mod source;
pub mod format;
pub mod member;
pub mod lock;
pub mod store;
pub mod container;
pub mod resolver;
pub mod superblock;
pub mod codec;
pub mod block;
pub mod index;
pub mod io_stream;
pub mod archive;

pub use info::ComicInfo;
pub use source::{ContainerFormat, Source};
pub use format::{CapabilityResolver, FormatDescriptor};
pub use member::is_supported_image;
pub use lock::{LockError, LockMode, SourceLocks};
pub use resolver::{LoadingMethod, MetadataResolver, ResolverOptions};
pub use archive::{Book, PackOptions};
