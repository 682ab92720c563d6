use crate::cloud::*;
use crate::ebcli::{CommandOutput, ExternalCommand};
use crate::error::EbiResult;
use crate::models::*;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

/// In-memory AWS stand-in for tests and dry runs.
pub struct MockAwsCloudClients {
    pub platform: MockBeanstalkClient,
    pub object_store: MockS3Client,
    pub scaling: MockAutoScalingClient,
    pub instance_health: MockEc2Client,
}

impl MockAwsCloudClients {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            platform: MockBeanstalkClient::new(bucket),
            object_store: MockS3Client::new(),
            scaling: MockAutoScalingClient::new(),
            instance_health: MockEc2Client::new(),
        }
    }
}

impl CloudClients for MockAwsCloudClients {
    fn platform(&self) -> &dyn PlatformClient {
        &self.platform
    }

    fn object_store(&self) -> &dyn ObjectStoreClient {
        &self.object_store
    }

    fn scaling(&self) -> &dyn ScalingClient {
        &self.scaling
    }

    fn instance_health(&self) -> &dyn InstanceHealthClient {
        &self.instance_health
    }
}

/// Mock Elastic Beanstalk client. Records every mutating call.
pub struct MockBeanstalkClient {
    bucket: String,
    environments: Mutex<Vec<EnvironmentSummary>>,
    versions: Mutex<Vec<ApplicationVersionRequest>>,
    option_updates: Mutex<Vec<(String, String, Vec<OptionSetting>)>>,
    swaps: Mutex<Vec<(String, String)>>,
    failures: Mutex<HashMap<String, String>>,
}

impl MockBeanstalkClient {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            environments: Mutex::new(Vec::new()),
            versions: Mutex::new(Vec::new()),
            option_updates: Mutex::new(Vec::new()),
            swaps: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_environment(&self, name: &str, cname: &str) {
        self.environments
            .lock()
            .unwrap()
            .push(EnvironmentSummary::new(name, cname));
    }

    /// Make `operation` (the trait method name) fail with a transport error.
    pub fn fail_on(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), message.to_string());
    }

    pub fn versions(&self) -> Vec<ApplicationVersionRequest> {
        self.versions.lock().unwrap().clone()
    }

    pub fn option_updates(&self) -> Vec<(String, String, Vec<OptionSetting>)> {
        self.option_updates.lock().unwrap().clone()
    }

    pub fn swaps(&self) -> Vec<(String, String)> {
        self.swaps.lock().unwrap().clone()
    }

    fn check_failure(&self, operation: &str) -> Result<(), CloudError> {
        match self.failures.lock().unwrap().get(operation) {
            Some(message) => Err(CloudError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformClient for MockBeanstalkClient {
    async fn list_environments(
        &self,
        _application_name: &str,
    ) -> Result<Vec<EnvironmentSummary>, CloudError> {
        self.check_failure("list_environments")?;
        Ok(self.environments.lock().unwrap().clone())
    }

    async fn storage_location(&self) -> Result<String, CloudError> {
        self.check_failure("storage_location")?;
        Ok(self.bucket.clone())
    }

    async fn create_application_version(
        &self,
        request: &ApplicationVersionRequest,
    ) -> Result<(), CloudError> {
        self.check_failure("create_application_version")?;
        self.versions.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn update_environment_options(
        &self,
        application_name: &str,
        environment_name: &str,
        settings: &[OptionSetting],
    ) -> Result<(), CloudError> {
        self.check_failure("update_environment_options")?;
        self.option_updates.lock().unwrap().push((
            application_name.to_string(),
            environment_name.to_string(),
            settings.to_vec(),
        ));
        Ok(())
    }

    async fn swap_environment_cnames(
        &self,
        source_environment: &str,
        destination_environment: &str,
    ) -> Result<(), CloudError> {
        self.check_failure("swap_environment_cnames")?;
        self.swaps.lock().unwrap().push((
            source_environment.to_string(),
            destination_environment.to_string(),
        ));
        Ok(())
    }
}

/// Mock S3 client storing object sizes by `(bucket, key)`.
pub struct MockS3Client {
    objects: Mutex<HashMap<(String, String), usize>>,
    puts: Mutex<Vec<(String, String)>>,
    failures: Mutex<HashMap<String, String>>,
}

impl MockS3Client {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            puts: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make `operation` (the trait method name) fail with a transport error.
    pub fn fail_on(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), message.to_string());
    }

    fn check_failure(&self, operation: &str) -> Result<(), CloudError> {
        match self.failures.lock().unwrap().get(operation) {
            Some(message) => Err(CloudError::Transport(message.clone())),
            None => Ok(()),
        }
    }

    pub fn insert_object(&self, bucket: &str, key: &str, size: usize) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), size);
    }

    pub fn puts(&self) -> Vec<(String, String)> {
        self.puts.lock().unwrap().clone()
    }
}

impl Default for MockS3Client {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStoreClient for MockS3Client {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, CloudError> {
        self.check_failure("head_object")?;
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|size| ObjectInfo {
                content_length: Some(*size as i64),
                e_tag: None,
            }))
    }

    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), CloudError> {
        self.check_failure("put_object")?;
        let size = std::fs::read(path)
            .map_err(|e| CloudError::Unknown(format!("cannot read {}: {}", path.display(), e)))?
            .len();
        self.insert_object(bucket, key, size);
        self.puts
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Mock Auto Scaling client.
///
/// Instance lists are scripted per group: each describe call pops the next
/// list, and the last one sticks.
pub struct MockAutoScalingClient {
    groups_by_environment: Mutex<HashMap<String, String>>,
    capacities: Mutex<HashMap<String, CapacityBounds>>,
    instance_script: Mutex<HashMap<String, VecDeque<Vec<String>>>>,
    capacity_updates: Mutex<Vec<(String, CapacityBounds)>>,
}

impl MockAutoScalingClient {
    pub fn new() -> Self {
        Self {
            groups_by_environment: Mutex::new(HashMap::new()),
            capacities: Mutex::new(HashMap::new()),
            instance_script: Mutex::new(HashMap::new()),
            capacity_updates: Mutex::new(Vec::new()),
        }
    }

    pub fn add_group(&self, environment_name: &str, group_name: &str, capacity: CapacityBounds) {
        self.groups_by_environment
            .lock()
            .unwrap()
            .insert(environment_name.to_string(), group_name.to_string());
        self.capacities
            .lock()
            .unwrap()
            .insert(group_name.to_string(), capacity);
    }

    pub fn script_instances(&self, group_name: &str, snapshots: Vec<Vec<&str>>) {
        let snapshots = snapshots
            .into_iter()
            .map(|ids| ids.into_iter().map(str::to_string).collect())
            .collect();
        self.instance_script
            .lock()
            .unwrap()
            .insert(group_name.to_string(), snapshots);
    }

    pub fn capacity_updates(&self) -> Vec<(String, CapacityBounds)> {
        self.capacity_updates.lock().unwrap().clone()
    }

    fn next_instances(&self, group_name: &str) -> Vec<String> {
        let mut script = self.instance_script.lock().unwrap();
        match script.get_mut(group_name) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

impl Default for MockAutoScalingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScalingClient for MockAutoScalingClient {
    async fn group_names_for_environments(
        &self,
        environment_names: &[String],
    ) -> Result<HashMap<String, String>, CloudError> {
        let groups = self.groups_by_environment.lock().unwrap();
        Ok(environment_names
            .iter()
            .filter_map(|env| groups.get(env).map(|g| (env.clone(), g.clone())))
            .collect())
    }

    async fn describe_group(&self, group_name: &str) -> Result<Option<ScalingGroup>, CloudError> {
        let capacity = match self.capacities.lock().unwrap().get(group_name) {
            Some(capacity) => *capacity,
            None => return Ok(None),
        };
        Ok(Some(ScalingGroup {
            name: group_name.to_string(),
            capacity,
            instance_ids: self.next_instances(group_name),
        }))
    }

    async fn update_group_capacity(
        &self,
        group_name: &str,
        capacity: &CapacityBounds,
    ) -> Result<(), CloudError> {
        let mut capacities = self.capacities.lock().unwrap();
        if !capacities.contains_key(group_name) {
            return Err(CloudError::ResourceNotFound(group_name.to_string()));
        }
        capacities.insert(group_name.to_string(), *capacity);
        self.capacity_updates
            .lock()
            .unwrap()
            .push((group_name.to_string(), *capacity));
        Ok(())
    }
}

/// Mock EC2 status client; statuses are scripted like instance lists.
pub struct MockEc2Client {
    status_script: Mutex<HashMap<String, VecDeque<Option<String>>>>,
}

impl MockEc2Client {
    pub fn new() -> Self {
        Self {
            status_script: Mutex::new(HashMap::new()),
        }
    }

    pub fn script_status(&self, instance_id: &str, statuses: Vec<Option<&str>>) {
        let statuses = statuses
            .into_iter()
            .map(|s| s.map(str::to_string))
            .collect();
        self.status_script
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), statuses);
    }
}

impl Default for MockEc2Client {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceHealthClient for MockEc2Client {
    async fn instance_status(&self, instance_id: &str) -> Result<Option<String>, CloudError> {
        let mut script = self.status_script.lock().unwrap();
        Ok(match script.get_mut(instance_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().flatten(),
            Some(queue) => queue.front().cloned().flatten(),
            None => None,
        })
    }
}

/// Records `eb` invocations and answers with scripted exit codes (default 0).
pub struct MockExternalCommand {
    calls: Mutex<Vec<Vec<String>>>,
    exit_codes: Mutex<VecDeque<i32>>,
}

impl MockExternalCommand {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_codes: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_exit_codes(codes: Vec<i32>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_codes: Mutex::new(codes.into()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockExternalCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalCommand for MockExternalCommand {
    async fn run(&self, args: &[String]) -> EbiResult<CommandOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        let code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
        Ok(CommandOutput {
            code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
