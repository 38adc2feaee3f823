//! Resource kinds managed by the repository layer

pub mod common;
pub mod connection;
pub mod deployment;
pub mod integration;
pub mod packaging;
pub mod training;

pub use common::{ResourceList, ResourceRequirements, Target};
pub use connection::{
    Connection, ConnectionFilter, ConnectionSpec, ConnectionStatus, ConnectionType,
    SENSITIVE_DATA_MASK,
};
pub use deployment::{
    ModelDeployment, ModelDeploymentFilter, ModelDeploymentSpec, ModelDeploymentStatus,
    ModelDeploymentTarget, ModelRoute, ModelRouteFilter, ModelRouteSpec, ModelRouteStatus,
};
pub use integration::{
    ArgumentsSchema, Integration, IntegrationSchema, IntegrationSpec, IntegrationStatus,
    PackagingIntegration, Parameter, Property, TargetSchema, ToolchainIntegration,
};
pub use packaging::{
    ModelPackaging, ModelPackagingFilter, ModelPackagingSpec, ModelPackagingStatus,
    PackagingResult,
};
pub use training::{
    ModelIdentity, ModelTraining, ModelTrainingFilter, ModelTrainingSpec, ModelTrainingStatus,
    TrainingResult, DEFAULT_ARTIFACT_NAME_TEMPLATE,
};
